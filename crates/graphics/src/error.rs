use std::{fmt, path::PathBuf};

use tracing::{error, info};

/// The steps of graphics initialization, in the order they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InitStage {
    DebugLayer,
    Factory,
    Adapter,
    Device,
    Commands,
    Swapchain,
    Heaps,
    SyncObjects,
}

impl InitStage {
    pub const ALL: [Self; 8] = [
        Self::DebugLayer,
        Self::Factory,
        Self::Adapter,
        Self::Device,
        Self::Commands,
        Self::Swapchain,
        Self::Heaps,
        Self::SyncObjects,
    ];
}

impl fmt::Display for InitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DebugLayer => "debug layer",
            Self::Factory => "factory",
            Self::Adapter => "adapter",
            Self::Device => "device",
            Self::Commands => "command objects",
            Self::Swapchain => "swapchain",
            Self::Heaps => "descriptor heaps",
            Self::SyncObjects => "sync objects",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("graphics initialization failed: {stage}")]
    Init {
        stage: InitStage,
        #[source]
        source: Box<Error>,
    },

    #[error("no hardware adapter found")]
    NoHardwareAdapter,

    #[error("the adapter does not support any of the requested feature levels")]
    NoSupportedFeatureLevel,

    #[error("SRV limit exceeded ({used}/{capacity})")]
    DescriptorHeapExhausted { used: u32, capacity: u32 },

    #[error("failed to compile {} ({profile}):\n{diagnostics}", path.display())]
    ShaderCompile {
        path: PathBuf,
        profile: String,
        diagnostics: String,
    },

    #[error("could not read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode image {}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: png::DecodingError,
    },

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("no texture is loaded with id {0}")]
    UnknownTexture(u32),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[cfg(target_os = "windows")]
    #[error(transparent)]
    Api(#[from] windows::core::Error),

    #[error("{0}")]
    Backend(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Runs one initialization stage, logging its outcome. A failure is wrapped
/// so that callers can tell which stage stopped initialization.
pub(crate) fn init_stage<T>(stage: InitStage, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match f() {
        Ok(value) => {
            info!("{stage}: OK");
            Ok(value)
        }
        Err(err) => {
            error!("{stage}: NG ({err})");
            Err(Error::Init {
                stage,
                source: Box::new(err),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_failure_is_wrapped() {
        let result: Result<()> = init_stage(InitStage::Heaps, || {
            Err(Error::DescriptorHeapExhausted {
                used: 4,
                capacity: 4,
            })
        });

        match result {
            Err(Error::Init { stage, source }) => {
                assert_eq!(stage, InitStage::Heaps);
                assert!(matches!(*source, Error::DescriptorHeapExhausted { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(init_stage(InitStage::Device, || Ok(7)).ok(), Some(7));
    }
}
