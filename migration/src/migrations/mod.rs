pub mod m202608100001_create_users;
pub mod m202608100002_create_courses;
pub mod m202608100003_create_course_students;
pub mod m202608100004_create_face_templates;
pub mod m202608100005_create_attendance;
