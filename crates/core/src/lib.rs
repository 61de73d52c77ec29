pub mod shared {
    pub mod canvas;
    pub mod constants;
    pub mod descriptor;
    pub mod source_image;
}

pub mod normalization {
    pub mod domain {
        pub mod image_normalizer;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_detector;
        pub mod face_landmarks;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod batch_result;
    pub mod extract_descriptors_use_case;
    pub mod extraction_config;
    pub mod pipeline_logger;
    pub mod shared_extractor;
}

pub mod search {
    pub mod domain {
        pub mod face_search;
    }
    pub mod infrastructure;
}
