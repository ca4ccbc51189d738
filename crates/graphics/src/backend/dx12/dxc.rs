use windows::{
    core::{HSTRING, PCWSTR},
    Win32::Graphics::Direct3D::Dxc::*,
};

use crate::{CompileOutput, Result, ShaderToolchain};

/// The DirectX Shader Compiler, loaded from `dxcompiler.dll`.
pub struct Dxc {
    _utils: IDxcUtils,
    compiler: IDxcCompiler3,
    include_handler: IDxcIncludeHandler,
}

impl Dxc {
    pub fn new() -> Result<Self> {
        let utils: IDxcUtils = unsafe { DxcCreateInstance(&CLSID_DxcUtils) }?;
        let compiler: IDxcCompiler3 = unsafe { DxcCreateInstance(&CLSID_DxcCompiler) }?;
        let include_handler = unsafe { utils.CreateDefaultIncludeHandler() }?;

        Ok(Self {
            _utils: utils,
            compiler,
            include_handler,
        })
    }
}

impl ShaderToolchain for Dxc {
    fn compile(&self, source: &[u8], arguments: &[String]) -> Result<CompileOutput> {
        let buffer = DxcBuffer {
            Ptr: source.as_ptr().cast(),
            Size: source.len(),
            Encoding: DXC_CP_UTF8.0,
        };

        // The PCWSTRs borrow from these.
        let arguments: Vec<HSTRING> = arguments.iter().map(HSTRING::from).collect();
        let pointers: Vec<PCWSTR> = arguments.iter().map(|a| PCWSTR(a.as_ptr())).collect();

        let result: IDxcResult = unsafe {
            self.compiler
                .Compile(&buffer, Some(&pointers), &self.include_handler)
        }?;

        let diagnostics = unsafe { result.GetErrorBuffer() }
            .map(|blob| {
                let bytes = unsafe {
                    std::slice::from_raw_parts(
                        blob.GetBufferPointer().cast::<u8>(),
                        blob.GetBufferSize(),
                    )
                };
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_owned()
            })
            .unwrap_or_default();

        let status = unsafe { result.GetStatus() }?;
        let object = if status.is_ok() {
            let blob = unsafe { result.GetResult() }?;
            let bytes = unsafe {
                std::slice::from_raw_parts(blob.GetBufferPointer().cast::<u8>(), blob.GetBufferSize())
            };
            Some(bytes.to_vec())
        } else {
            None
        };

        Ok(CompileOutput {
            object,
            diagnostics,
        })
    }
}
