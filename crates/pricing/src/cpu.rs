//! Runtime CPU capability detection for the batch pricer.
//!
//! Detection runs once per process and is cached; batch calls only read the
//! cached flags.

use std::sync::OnceLock;

use serde::Serialize;

static CPU_FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuFeatures {
    pub has_avx: bool,
    pub has_avx2: bool,
    pub has_fma: bool,
}

impl CpuFeatures {
    #[must_use]
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            Self {
                has_avx: is_x86_feature_detected!("avx"),
                has_avx2: is_x86_feature_detected!("avx2"),
                has_fma: is_x86_feature_detected!("fma"),
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            Self::none()
        }
    }

    /// No vector support; forces the scalar path.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            has_avx: false,
            has_avx2: false,
            has_fma: false,
        }
    }

    /// Whether the 4-lane kernels can run. Only AVX is required; FMA is
    /// deliberately unused so results match the scalar model exactly.
    #[must_use]
    pub const fn vector_path_available(&self) -> bool {
        self.has_avx
    }
}

/// Cached process-wide features.
pub fn cpu_features() -> &'static CpuFeatures {
    CPU_FEATURES.get_or_init(|| {
        let features = CpuFeatures::detect();
        if features.vector_path_available() {
            tracing::debug!(?features, "AVX batch pricing enabled");
        } else {
            tracing::info!(?features, "AVX unavailable, batch pricing uses the scalar path");
        }
        features
    })
}
