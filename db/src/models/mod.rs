pub mod attendance_record;
pub mod attendance_session;
pub mod course;
pub mod course_student;
pub mod face_template;
pub mod user;
