use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(AccountRestrictions::Table)
                .if_not_exists()
                .col(ColumnDef::new(AccountRestrictions::SellerId).string().not_null().primary_key())
                .col(ColumnDef::new(AccountRestrictions::Active).boolean().not_null().default(false))
                .col(
                    ColumnDef::new(AccountRestrictions::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .to_owned()
        ).await?;

        manager.create_table(
            Table::create()
                .table(RestrictionReasons::Table)
                .if_not_exists()
                .col(ColumnDef::new(RestrictionReasons::SellerId).string().not_null())
                .col(ColumnDef::new(RestrictionReasons::TransactionId).uuid().not_null())
                .col(
                    ColumnDef::new(RestrictionReasons::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .primary_key(
                    Index::create()
                        .col(RestrictionReasons::SellerId)
                        .col(RestrictionReasons::TransactionId)
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_restriction_reasons_seller")
                        .from(RestrictionReasons::Table, RestrictionReasons::SellerId)
                        .to(AccountRestrictions::Table, AccountRestrictions::SellerId)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_restriction_reasons_confirmation")
                        .from(RestrictionReasons::Table, RestrictionReasons::TransactionId)
                        .to(PaymentConfirmations::Table, PaymentConfirmations::TransactionId)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(RestrictionReasons::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(AccountRestrictions::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum AccountRestrictions {
    Table,
    SellerId,
    Active,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RestrictionReasons {
    Table,
    SellerId,
    TransactionId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PaymentConfirmations {
    Table,
    TransactionId,
}
