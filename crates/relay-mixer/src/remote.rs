//! VoicemeeterRemote: load the vendor control DLL and call it through `extern "system"` pointers.

use crate::bus::ParameterBus;
use crate::error::{check_status, MixerError, MixerResult};
use crate::key::ParamKey;
use libloading::Library;
use serde::{Deserialize, Serialize};
use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

type LoginFn = unsafe extern "system" fn() -> i32;
type LogoutFn = unsafe extern "system" fn() -> i32;
type RunFn = unsafe extern "system" fn(i32) -> i32;
type GetTypeFn = unsafe extern "system" fn(*mut i32) -> i32;
type IsDirtyFn = unsafe extern "system" fn() -> i32;
type GetFloatFn = unsafe extern "system" fn(*const c_char, *mut f32) -> i32;
type SetFloatFn = unsafe extern "system" fn(*const c_char, f32) -> i32;
type GetStringFn = unsafe extern "system" fn(*const c_char, *mut c_char) -> i32;
type SetStringFn = unsafe extern "system" fn(*const c_char, *const c_char) -> i32;

/// The vendor's string getter writes into a caller buffer of this size.
const STRING_PARAM_LEN: usize = 512;

/// Mixer application flavour, as used by `VBVMR_RunVoicemeeter` / `VBVMR_GetVoicemeeterType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edition {
    Standard,
    Banana,
    Potato,
}

impl Edition {
    pub fn code(self) -> i32 {
        match self {
            Edition::Standard => 1,
            Edition::Banana => 2,
            Edition::Potato => 3,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Edition::Standard),
            2 => Some(Edition::Banana),
            3 => Some(Edition::Potato),
            _ => None,
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Edition::Standard => "Voicemeeter Standard",
            Edition::Banana => "Voicemeeter Banana",
            Edition::Potato => "Voicemeeter Potato",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful `VBVMR_Login`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStatus {
    Ready,
    /// Logged in, but the mixer application is not running.
    AppNotRunning,
}

impl LoginStatus {
    pub fn from_code(code: i32) -> MixerResult<Self> {
        match check_status("VBVMR_Login", code)? {
            1 => Ok(LoginStatus::AppNotRunning),
            _ => Ok(LoginStatus::Ready),
        }
    }
}

/// Lifecycle calls on top of parameter access. `MixerSession` drives these.
pub trait RemoteControl: ParameterBus {
    fn login(&self) -> MixerResult<LoginStatus>;
    fn logout(&self) -> MixerResult<()>;
    fn run(&self, edition: Edition) -> MixerResult<()>;
    fn edition(&self) -> MixerResult<Option<Edition>>;
}

/// Loaded control library. The `Library` is kept alive so the function pointers stay valid.
pub struct VoicemeeterRemote {
    _lib: Library,
    login: LoginFn,
    logout: LogoutFn,
    run: RunFn,
    get_type: GetTypeFn,
    is_dirty: IsDirtyFn,
    get_float: GetFloatFn,
    set_float: SetFloatFn,
    get_string: GetStringFn,
    set_string: SetStringFn,
}

fn symbol<T: Copy>(lib: &Library, name: &'static str) -> MixerResult<T> {
    unsafe {
        lib.get::<T>(name.as_bytes())
            .map(|s| *s)
            .map_err(|e| MixerError::MissingSymbol {
                symbol: name,
                reason: e.to_string(),
            })
    }
}

impl VoicemeeterRemote {
    /// Load the DLL at `path` and resolve every entry point up front.
    pub fn load<P: AsRef<Path>>(path: P) -> MixerResult<Self> {
        let path = path.as_ref();
        info!("🎛️ Loading mixer control library from {}", path.display());
        let lib = unsafe {
            Library::new(path).map_err(|e| MixerError::LibraryLoad {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?
        };
        let remote = Self {
            login: symbol(&lib, "VBVMR_Login")?,
            logout: symbol(&lib, "VBVMR_Logout")?,
            run: symbol(&lib, "VBVMR_RunVoicemeeter")?,
            get_type: symbol(&lib, "VBVMR_GetVoicemeeterType")?,
            is_dirty: symbol(&lib, "VBVMR_IsParametersDirty")?,
            get_float: symbol(&lib, "VBVMR_GetParameterFloat")?,
            set_float: symbol(&lib, "VBVMR_SetParameterFloat")?,
            get_string: symbol(&lib, "VBVMR_GetParameterStringA")?,
            set_string: symbol(&lib, "VBVMR_SetParameterStringA")?,
            _lib: lib,
        };
        debug!("mixer control entry points resolved");
        Ok(remote)
    }

    /// Polling the dirty flag makes the DLL refresh its parameter cache before a read.
    fn sync(&self) -> MixerResult<bool> {
        let code = unsafe { (self.is_dirty)() };
        Ok(check_status("VBVMR_IsParametersDirty", code)? == 1)
    }
}

impl ParameterBus for VoicemeeterRemote {
    fn get_float(&self, key: &ParamKey) -> MixerResult<f32> {
        self.sync()?;
        let name = key.to_cstring()?;
        let mut value = 0.0f32;
        let code = unsafe { (self.get_float)(name.as_ptr(), &mut value) };
        check_status("VBVMR_GetParameterFloat", code)?;
        Ok(value)
    }

    fn set_float(&self, key: &ParamKey, value: f32) -> MixerResult<()> {
        let name = key.to_cstring()?;
        let code = unsafe { (self.set_float)(name.as_ptr(), value) };
        check_status("VBVMR_SetParameterFloat", code)?;
        debug!("{} = {}", key, value);
        Ok(())
    }

    fn get_string(&self, key: &ParamKey) -> MixerResult<String> {
        self.sync()?;
        let name = key.to_cstring()?;
        let mut buf = [0 as c_char; STRING_PARAM_LEN];
        let code = unsafe { (self.get_string)(name.as_ptr(), buf.as_mut_ptr()) };
        check_status("VBVMR_GetParameterStringA", code)?;
        // Force termination in case the DLL filled the whole buffer.
        buf[STRING_PARAM_LEN - 1] = 0;
        let value = unsafe { CStr::from_ptr(buf.as_ptr()) };
        Ok(value.to_string_lossy().into_owned())
    }

    fn set_string(&self, key: &ParamKey, value: &str) -> MixerResult<()> {
        let name = key.to_cstring()?;
        let c_value =
            CString::new(value).map_err(|_| MixerError::InvalidKey(format!("{} = {:?}", key, value)))?;
        let code = unsafe { (self.set_string)(name.as_ptr(), c_value.as_ptr()) };
        check_status("VBVMR_SetParameterStringA", code)?;
        debug!("{} = '{}'", key, value);
        Ok(())
    }
}

impl RemoteControl for VoicemeeterRemote {
    fn login(&self) -> MixerResult<LoginStatus> {
        LoginStatus::from_code(unsafe { (self.login)() })
    }

    fn logout(&self) -> MixerResult<()> {
        check_status("VBVMR_Logout", unsafe { (self.logout)() })?;
        Ok(())
    }

    fn run(&self, edition: Edition) -> MixerResult<()> {
        check_status("VBVMR_RunVoicemeeter", unsafe { (self.run)(edition.code()) })?;
        Ok(())
    }

    fn edition(&self) -> MixerResult<Option<Edition>> {
        let mut code = 0i32;
        check_status("VBVMR_GetVoicemeeterType", unsafe { (self.get_type)(&mut code) })?;
        Ok(Edition::from_code(code))
    }
}
