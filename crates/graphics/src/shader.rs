//! Runtime HLSL compilation.

use std::path::Path;

use tracing::{error, info, warn};

use crate::{Error, Result};

/// Compiled shader object code, ready to be handed to pipeline creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderBytecode(Vec<u8>);

impl ShaderBytecode {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What to do with a compile that succeeds with diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DiagnosticPolicy {
    /// Any diagnostic fails the compile, warnings included.
    #[default]
    Deny,
    /// Warnings are logged and the object code is kept.
    AllowWarnings,
}

/// Raw result of invoking a compiler.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompileOutput {
    /// `None` if compilation failed.
    pub object: Option<Vec<u8>>,
    /// Warnings and errors as printed by the compiler. Empty for a clean
    /// compile.
    pub diagnostics: String,
}

/// A shader compiler. The arguments are produced by [`compile_arguments`].
pub trait ShaderToolchain {
    fn compile(&self, source: &[u8], arguments: &[String]) -> Result<CompileOutput>;
}

/// The arguments every shader is compiled with: entry point `main`, debug
/// info embedded in the object, optimizations off and row-major matrices.
#[must_use]
pub fn compile_arguments(path: &Path, profile: &str) -> Vec<String> {
    let mut arguments = vec![path.display().to_string()];
    arguments.extend(
        [
            "-E",
            "main",
            "-T",
            profile,
            "-Zi",
            "-Qembed_debug",
            "-Od",
            "-Zpr",
        ]
        .map(str::to_owned),
    );
    arguments
}

#[cfg(target_os = "windows")]
pub type PlatformToolchain = crate::backend::dx12::Dxc;

#[cfg(not(target_os = "windows"))]
pub type PlatformToolchain = Unavailable;

/// Stands in for a compiler on platforms without one.
#[cfg(not(target_os = "windows"))]
#[derive(Debug, Default)]
pub struct Unavailable;

#[cfg(not(target_os = "windows"))]
impl Unavailable {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

#[cfg(not(target_os = "windows"))]
impl ShaderToolchain for Unavailable {
    fn compile(&self, _: &[u8], _: &[String]) -> Result<CompileOutput> {
        Err(Error::Unsupported("shader compilation"))
    }
}

pub struct ShaderCompiler<T: ShaderToolchain> {
    toolchain: T,
    policy: DiagnosticPolicy,
}

impl ShaderCompiler<PlatformToolchain> {
    /// Creates a compiler backed by the platform's shader toolchain.
    pub fn platform(policy: DiagnosticPolicy) -> Result<Self> {
        Ok(Self::with_policy(PlatformToolchain::new()?, policy))
    }
}

impl<T: ShaderToolchain> ShaderCompiler<T> {
    pub fn new(toolchain: T) -> Self {
        Self::with_policy(toolchain, DiagnosticPolicy::default())
    }

    pub fn with_policy(toolchain: T, policy: DiagnosticPolicy) -> Self {
        Self { toolchain, policy }
    }

    #[must_use]
    pub fn policy(&self) -> DiagnosticPolicy {
        self.policy
    }

    /// Compiles the HLSL file at `path` for `profile` (e.g. `vs_6_0`).
    pub fn compile(&self, path: &Path, profile: &str) -> Result<ShaderBytecode> {
        info!("Begin CompileShader, path:{}, profile:{profile}", path.display());

        let source = std::fs::read(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;

        let output = self
            .toolchain
            .compile(&source, &compile_arguments(path, profile))?;

        let fail = |diagnostics: String| {
            error!("{diagnostics}");
            Error::ShaderCompile {
                path: path.to_owned(),
                profile: profile.to_owned(),
                diagnostics,
            }
        };

        let object = match output.object {
            Some(object) if output.diagnostics.is_empty() => object,
            Some(object) if self.policy == DiagnosticPolicy::AllowWarnings => {
                warn!("{}", output.diagnostics);
                object
            }
            Some(_) => return Err(fail(output.diagnostics)),
            None if output.diagnostics.is_empty() => {
                return Err(fail("the compiler produced no output".to_owned()))
            }
            None => return Err(fail(output.diagnostics)),
        };

        info!("Compile Succeeded, path:{}, profile:{profile}", path.display());
        Ok(ShaderBytecode(object))
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, io::Write};

    use super::*;

    struct FakeToolchain {
        output: CompileOutput,
        calls: RefCell<Vec<(Vec<u8>, Vec<String>)>>,
    }

    impl FakeToolchain {
        fn returning(object: Option<&[u8]>, diagnostics: &str) -> Self {
            Self {
                output: CompileOutput {
                    object: object.map(<[u8]>::to_vec),
                    diagnostics: diagnostics.to_owned(),
                },
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ShaderToolchain for &FakeToolchain {
        fn compile(&self, source: &[u8], arguments: &[String]) -> Result<CompileOutput> {
            self.calls
                .borrow_mut()
                .push((source.to_vec(), arguments.to_vec()));
            Ok(self.output.clone())
        }
    }

    fn source_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".hlsl").tempfile().unwrap();
        file.write_all(b"float4 main() : SV_TARGET { return 1; }")
            .unwrap();
        file
    }

    #[test]
    fn arguments() {
        let args = compile_arguments(Path::new("Object3D.VS.hlsl"), "vs_6_0");
        assert_eq!(
            args,
            [
                "Object3D.VS.hlsl",
                "-E",
                "main",
                "-T",
                "vs_6_0",
                "-Zi",
                "-Qembed_debug",
                "-Od",
                "-Zpr"
            ]
        );
    }

    #[test]
    fn clean_compile() {
        let file = source_file();
        let toolchain = FakeToolchain::returning(Some(&[0xDE, 0xAD]), "");
        let compiler = ShaderCompiler::new(&toolchain);

        let bytecode = compiler.compile(file.path(), "ps_6_0").unwrap();
        assert_eq!(bytecode.as_bytes(), [0xDE, 0xAD]);

        let calls = toolchain.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.starts_with(b"float4 main()"));
        assert_eq!(calls[0].1[4], "ps_6_0");
    }

    #[test]
    fn warnings_are_errors_by_default() {
        let file = source_file();
        let toolchain = FakeToolchain::returning(Some(&[1]), "warning: implicit truncation");

        let result = ShaderCompiler::new(&toolchain).compile(file.path(), "vs_6_0");
        match result {
            Err(Error::ShaderCompile {
                profile,
                diagnostics,
                ..
            }) => {
                assert_eq!(profile, "vs_6_0");
                assert!(diagnostics.contains("implicit truncation"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let compiler = ShaderCompiler::with_policy(&toolchain, DiagnosticPolicy::AllowWarnings);
        assert_eq!(
            compiler.compile(file.path(), "vs_6_0").unwrap().as_bytes(),
            [1]
        );
    }

    #[test]
    fn errors_are_reported() {
        let file = source_file();
        let toolchain = FakeToolchain::returning(None, "error: undeclared identifier 'x'");
        let compiler = ShaderCompiler::with_policy(&toolchain, DiagnosticPolicy::AllowWarnings);

        assert!(matches!(
            compiler.compile(file.path(), "ps_6_0"),
            Err(Error::ShaderCompile { diagnostics, .. }) if diagnostics.contains("undeclared")
        ));
    }

    #[test]
    fn missing_file() {
        let toolchain = FakeToolchain::returning(Some(&[1]), "");
        let result = ShaderCompiler::new(&toolchain).compile(Path::new("no/such/file.hlsl"), "vs_6_0");

        assert!(matches!(result, Err(Error::Io { .. })));
        assert!(toolchain.calls.borrow().is_empty());
    }
}
