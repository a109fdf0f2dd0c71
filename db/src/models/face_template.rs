use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DatabaseConnection, EntityTrait, Set, sea_query::OnConflict};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A user's enrolled biometric template: one fixed-length embedding plus
/// the quality metrics recorded at enrollment. At most one row per user.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "face_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// JSON array of f32 produced by the face encoder.
    #[sea_orm(column_type = "Text")]
    pub embedding: String,
    pub quality_score: f32,
    pub registration_method: RegistrationMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RegistrationMethod {
    #[sea_orm(string_value = "basic")]
    Basic,
    #[sea_orm(string_value = "advanced")]
    Advanced,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_for_user(
        db: &DatabaseConnection,
        user_id: i64,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(user_id).one(db).await
    }

    /// Stores or replaces the user's template in one upsert statement, so
    /// a concurrent reader sees either the old row or the new one, never a
    /// half-written mix.
    pub async fn replace(
        db: &DatabaseConnection,
        user_id: i64,
        embedding: &[f32],
        quality_score: f32,
        method: RegistrationMethod,
    ) -> Result<(), DbErr> {
        let encoded = serde_json::to_string(embedding)
            .map_err(|e| DbErr::Custom(format!("embedding serialization failed: {e}")))?;

        let active = ActiveModel {
            user_id: Set(user_id),
            embedding: Set(encoded),
            quality_score: Set(quality_score),
            registration_method: Set(method),
            created_at: Set(Utc::now()),
        };

        Entity::insert(active)
            .on_conflict(
                OnConflict::column(Column::UserId)
                    .update_columns([
                        Column::Embedding,
                        Column::QualityScore,
                        Column::RegistrationMethod,
                        Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec(db)
            .await?;
        Ok(())
    }

    pub async fn delete_for_user(db: &DatabaseConnection, user_id: i64) -> Result<bool, DbErr> {
        let res = Entity::delete_by_id(user_id).exec(db).await?;
        Ok(res.rows_affected > 0)
    }

    /// Decodes the stored JSON embedding back into a vector.
    pub fn embedding_vec(&self) -> Result<Vec<f32>, DbErr> {
        serde_json::from_str(&self.embedding)
            .map_err(|e| DbErr::Custom(format!("stored embedding is corrupt: {e}")))
    }
}
