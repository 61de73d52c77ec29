pub mod static_face_search;
