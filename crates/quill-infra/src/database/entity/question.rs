//! Poll question entity for SeaORM.

use sea_orm::Set;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "questions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub question_text: String,
    pub pub_date: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::choice::Entity")]
    Choice,
}

impl Related<super::choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Choice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for quill_core::domain::Question {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            question_text: model.question_text,
            pub_date: model.pub_date.into(),
        }
    }
}

impl From<quill_core::domain::Question> for ActiveModel {
    fn from(question: quill_core::domain::Question) -> Self {
        Self {
            id: Set(question.id),
            question_text: Set(question.question_text),
            pub_date: Set(question.pub_date.into()),
        }
    }
}
