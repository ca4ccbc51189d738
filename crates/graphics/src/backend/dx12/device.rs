use windows::{
    core::{ComInterface, PCSTR},
    Win32::Graphics::{
        Direct3D::{
            D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
            D3D_FEATURE_LEVEL_12_0, D3D_FEATURE_LEVEL_12_1, D3D_FEATURE_LEVEL_12_2,
        },
        Direct3D12::*,
        Dxgi::*,
    },
};

use tracing::{debug, error, info, trace, warn};

use crate::{
    adapter::{create_with_fallback, select_hardware_adapter, AdapterInfo, FeatureLevel},
    error::init_stage,
    Error, GraphicsConfig, InitStage, PowerPreference, Result,
};

/// The device and the objects needed to create it.
pub struct Interfaces {
    pub is_debug: bool,
    pub factory: IDXGIFactory6,
    pub device: ID3D12Device,
    pub feature_level: FeatureLevel,
}

impl Interfaces {
    pub fn new(config: &GraphicsConfig) -> Result<Self> {
        let is_debug = config.is_debug();

        if is_debug {
            init_stage(InitStage::DebugLayer, enable_debug_layer)?;
        }

        // Use IDXGIFactory6 for power preference selection
        let factory: IDXGIFactory6 = init_stage(InitStage::Factory, || {
            let flags = if is_debug { DXGI_CREATE_FACTORY_DEBUG } else { 0 };
            Ok(unsafe { CreateDXGIFactory2(flags) }?)
        })?;

        let adapter = init_stage(InitStage::Adapter, || {
            select_adapter(&factory, config.power_preference)
        })?;

        let (device, feature_level) = init_stage(InitStage::Device, || {
            let (device, level) = create_with_fallback(|level| {
                let mut device: Option<ID3D12Device> = None;
                unsafe { D3D12CreateDevice(&adapter, to_d3d(level), &mut device) }?;
                device.ok_or_else(|| Error::Backend("D3D12CreateDevice returned no device".into()))
            })?;

            if is_debug {
                configure_info_queue(&device)?;
            }
            Ok((device, level))
        })?;

        Ok(Self {
            is_debug,
            factory,
            device,
            feature_level,
        })
    }

    extern "system" fn d3d12_debug_callback(
        _category: D3D12_MESSAGE_CATEGORY,
        severity: D3D12_MESSAGE_SEVERITY,
        id: D3D12_MESSAGE_ID,
        description: PCSTR,
        _context: *mut std::ffi::c_void,
    ) {
        let description = unsafe { description.display() };
        match severity {
            D3D12_MESSAGE_SEVERITY_CORRUPTION | D3D12_MESSAGE_SEVERITY_ERROR => {
                error!("D3D12: {id:?} {description}");
            }
            D3D12_MESSAGE_SEVERITY_WARNING => warn!("D3D12: {id:?} {description}"),
            D3D12_MESSAGE_SEVERITY_INFO => debug!("D3D12: {id:?} {description}"),
            _ => trace!("D3D12: {id:?} {description}"),
        }
    }
}

impl Drop for Interfaces {
    fn drop(&mut self) {
        if self.is_debug {
            let report = || -> windows::core::Result<()> {
                let dxgi_debug: IDXGIDebug1 = unsafe { DXGIGetDebugInterface1(0) }?;
                unsafe {
                    dxgi_debug.ReportLiveObjects(
                        DXGI_DEBUG_ALL,
                        DXGI_DEBUG_RLO_SUMMARY | DXGI_DEBUG_RLO_IGNORE_INTERNAL,
                    )
                }
            };

            if let Err(e) = report() {
                warn!("could not report live objects: {e}");
            }
        }
    }
}

fn enable_debug_layer() -> Result<()> {
    let mut debug: Option<ID3D12Debug1> = None;
    unsafe { D3D12GetDebugInterface(&mut debug) }?;

    if let Some(debug) = debug {
        unsafe {
            debug.EnableDebugLayer();
            debug.SetEnableGPUBasedValidation(true);
        }
    }

    Ok(())
}

fn select_adapter(factory: &IDXGIFactory6, preference: PowerPreference) -> Result<IDXGIAdapter1> {
    let preference = match preference {
        PowerPreference::DontCare => DXGI_GPU_PREFERENCE_UNSPECIFIED,
        PowerPreference::LowPower => DXGI_GPU_PREFERENCE_MINIMUM_POWER,
        PowerPreference::HighPerformance => DXGI_GPU_PREFERENCE_HIGH_PERFORMANCE,
    };

    let mut adapters = Vec::new();
    let mut infos = Vec::new();

    // Enumeration ends with DXGI_ERROR_NOT_FOUND.
    for index in 0.. {
        let adapter: IDXGIAdapter1 =
            match unsafe { factory.EnumAdapterByGpuPreference(index, preference) } {
                Ok(adapter) => adapter,
                Err(_) => break,
            };

        let desc = unsafe { adapter.GetDesc1() }?;
        let len = desc
            .Description
            .iter()
            .position(|c| *c == 0)
            .unwrap_or(desc.Description.len());

        infos.push(AdapterInfo {
            index,
            description: String::from_utf16_lossy(&desc.Description[..len]),
            is_software: desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32 != 0,
        });
        adapters.push(adapter);
    }

    let chosen = select_hardware_adapter(infos)?;
    Ok(adapters.swap_remove(chosen.index as usize))
}

fn to_d3d(level: FeatureLevel) -> D3D_FEATURE_LEVEL {
    match level {
        FeatureLevel::Level11_0 => D3D_FEATURE_LEVEL_11_0,
        FeatureLevel::Level11_1 => D3D_FEATURE_LEVEL_11_1,
        FeatureLevel::Level12_0 => D3D_FEATURE_LEVEL_12_0,
        FeatureLevel::Level12_1 => D3D_FEATURE_LEVEL_12_1,
        FeatureLevel::Level12_2 => D3D_FEATURE_LEVEL_12_2,
    }
}

/// Breaks on errors and forwards validation messages to the log.
fn configure_info_queue(device: &ID3D12Device) -> Result<()> {
    let queue: ID3D12InfoQueue = device.cast()?;
    unsafe {
        queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_CORRUPTION, true)?;
        queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_ERROR, true)?;
        queue.SetBreakOnSeverity(D3D12_MESSAGE_SEVERITY_WARNING, true)?;
    }

    // A known Windows 11 debug layer bug reports this for every
    // present.
    let mut deny_ids = [D3D12_MESSAGE_ID_RESOURCE_BARRIER_MISMATCHING_COMMAND_LIST_TYPE];
    let mut deny_severities = [D3D12_MESSAGE_SEVERITY_INFO];
    let filter = D3D12_INFO_QUEUE_FILTER {
        DenyList: D3D12_INFO_QUEUE_FILTER_DESC {
            NumSeverities: deny_severities.len() as u32,
            pSeverityList: deny_severities.as_mut_ptr(),
            NumIDs: deny_ids.len() as u32,
            pIDList: deny_ids.as_mut_ptr(),
            ..Default::default()
        },
        ..Default::default()
    };
    unsafe { queue.PushStorageFilter(&filter) }?;

    // ID3D12InfoQueue1 is only available on Windows 11.
    match queue.cast::<ID3D12InfoQueue1>() {
        Ok(queue) => {
            let mut cookie = 0;
            unsafe {
                queue.RegisterMessageCallback(
                    Some(Interfaces::d3d12_debug_callback),
                    D3D12_MESSAGE_CALLBACK_FLAG_NONE,
                    std::ptr::null(),
                    &mut cookie,
                )
            }?;
        }
        Err(_) => info!("ID3D12InfoQueue1 unavailable, validation messages will not be logged"),
    }

    Ok(())
}
