/// Environment variable naming an explicit NVML shared object to load.
pub const LIBRARY_PATH_ENV: &str = "RNVML_LIBRARY_PATH";

/// Default NVML shared object names, in the order they should be tried.
///
/// Explicit install locations come before bare names so that the system
/// search path is only consulted as a fallback.
pub fn default_library_candidates() -> Vec<String> {
    #[cfg(target_os = "windows")]
    {
        let mut candidates = Vec::new();
        if let Ok(program_files) = std::env::var("ProgramW6432") {
            candidates.push(format!(
                r"{}\NVIDIA Corporation\NVSMI\nvml.dll",
                program_files
            ));
        }
        candidates.push("nvml.dll".to_string());
        candidates
    }
    #[cfg(target_os = "linux")]
    {
        vec!["libnvidia-ml.so.1".to_string(), "libnvidia-ml.so".to_string()]
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        Vec::new()
    }
}

/// File names to join onto configured search directories.
pub fn library_file_names() -> &'static [&'static str] {
    #[cfg(target_os = "windows")]
    {
        &["nvml.dll"]
    }
    #[cfg(target_os = "linux")]
    {
        &["libnvidia-ml.so.1", "libnvidia-ml.so"]
    }
    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        &[]
    }
}

/// Returns the platform name string.
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    { "windows" }
    #[cfg(target_os = "linux")]
    { "linux" }
    #[cfg(target_os = "macos")]
    { "macos" }
    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    { "unknown" }
}
