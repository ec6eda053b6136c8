use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(PaymentConfirmations::Table)
                .if_not_exists()
                .col(
                    ColumnDef::new(PaymentConfirmations::TransactionId)
                        .uuid()
                        .not_null()
                        .primary_key()
                )
                .col(ColumnDef::new(PaymentConfirmations::SellerId).string().not_null())
                .col(ColumnDef::new(PaymentConfirmations::BuyerId).string().not_null())
                .col(ColumnDef::new(PaymentConfirmations::SellerTimezone).string_len(64).not_null())
                .col(
                    ColumnDef::new(PaymentConfirmations::NotifiedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .col(
                    ColumnDef::new(PaymentConfirmations::Deadline)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .col(
                    ColumnDef::new(PaymentConfirmations::Status)
                        .string_len(20)
                        .not_null()
                        .default("pending")
                ) // "pending", "confirmed", "expired"
                .col(ColumnDef::new(PaymentConfirmations::ConfirmedAt).timestamp_with_time_zone())
                .col(ColumnDef::new(PaymentConfirmations::ExpiredAt).timestamp_with_time_zone())
                .col(
                    ColumnDef::new(PaymentConfirmations::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .col(
                    ColumnDef::new(PaymentConfirmations::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .to_owned()
        ).await?;

        // The deadline scan filters on (status, deadline)
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_payment_confirmations_status_deadline")
                .table(PaymentConfirmations::Table)
                .col(PaymentConfirmations::Status)
                .col(PaymentConfirmations::Deadline)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_payment_confirmations_seller_id")
                .table(PaymentConfirmations::Table)
                .col(PaymentConfirmations::SellerId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(PaymentConfirmations::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum PaymentConfirmations {
    Table,
    TransactionId,
    SellerId,
    BuyerId,
    SellerTimezone,
    NotifiedAt,
    Deadline,
    Status,
    ConfirmedAt,
    ExpiredAt,
    CreatedAt,
    UpdatedAt,
}
