pub mod letterbox_normalizer;
