use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202608100001_create_users::Migration),
            Box::new(migrations::m202608100002_create_courses::Migration),
            Box::new(migrations::m202608100003_create_course_students::Migration),
            Box::new(migrations::m202608100004_create_face_templates::Migration),
            Box::new(migrations::m202608100005_create_attendance::Migration),
        ]
    }
}
