use std::path::Path;

/// Return the preferred ONNX execution providers for the current platform.
///
/// Falls back to CPU if the platform-specific provider is unavailable.
pub fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Build an inference session with the platform's preferred providers.
///
/// Inter-op parallelism is pinned to 1; intra-op uses every available core.
pub fn build_session(
    model_path: &Path,
) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    log::info!("Loaded model {}", model_path.display());
    Ok(session)
}

/// Errors when a session run returned no output tensors.
pub fn ensure_outputs(count: usize, model: &str) -> Result<(), Box<dyn std::error::Error>> {
    if count == 0 {
        return Err(format!("{model} model produced no outputs").into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_outputs_name_the_model() {
        let err = ensure_outputs(0, "ArcFace").unwrap_err();
        assert_eq!(err.to_string(), "ArcFace model produced no outputs");
        assert!(ensure_outputs(1, "ArcFace").is_ok());
    }

    #[test]
    fn test_missing_model_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(build_session(&dir.path().join("missing.onnx")).is_err());
    }
}
