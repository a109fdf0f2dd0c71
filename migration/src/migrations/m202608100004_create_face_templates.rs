use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202608100004_create_face_templates"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One template per user; re-registration replaces the row in place
        // via upsert, so readers never observe a partial template.
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("face_templates"))
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Alias::new("user_id"))
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Alias::new("embedding")).text().not_null())
                    .col(
                        ColumnDef::new(Alias::new("quality_score"))
                            .float()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Alias::new("registration_method"))
                            .string_len(20)
                            .not_null()
                            .default("basic"),
                    )
                    .col(
                        ColumnDef::new(Alias::new("created_at"))
                            .timestamp()
                            .not_null()
                            .default(Expr::cust("CURRENT_TIMESTAMP")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_face_template_user")
                            .from(Alias::new("face_templates"), Alias::new("user_id"))
                            .to(Alias::new("users"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("face_templates")).to_owned())
            .await
    }
}
