//! Per-organization installation layout.
//!
//! The agent, its supervisor and its data live in fixed per-platform
//! locations keyed by organization id. The scripts directory is the only one
//! the core writes to; the rest are reported through `get_installation`
//! requests so the controlling service can locate the installation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filesystem paths reported for `get_installation` requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallationData {
    pub service_executable_path: String,
    pub agent_executable_path: String,
    pub config_file_path: String,
    pub service_manager_path: String,
}

impl InstallationData {
    pub fn collect(org_id: &str) -> Self {
        Self {
            service_executable_path: path_string(service_executable_path(org_id)),
            agent_executable_path: path_string(agent_executable_path(org_id)),
            config_file_path: path_string(config_file_path(org_id)),
            service_manager_path: path_string(service_manager_path(org_id)),
        }
    }
}

fn path_string(path: PathBuf) -> String {
    path.display().to_string()
}

/// Directory for script files created by the interpreter. Created on demand;
/// concurrent writers rely on unique file names, not locking.
pub fn scripts_directory(org_id: &str) -> PathBuf {
    scripts_root().join(org_id)
}

/// Path of the device config file for an organization.
pub fn config_file_path(org_id: &str) -> PathBuf {
    data_directory(org_id).join("config.json")
}

/// Path of the agent log file for an organization.
pub fn log_file_path(org_id: &str) -> PathBuf {
    data_directory(org_id).join("rewst_agent.log")
}

/// OS service name the supervisor registers under.
#[cfg(windows)]
pub fn service_name(org_id: &str) -> String {
    format!("RewstRemoteAgent_{org_id}")
}

#[cfg(target_os = "macos")]
pub fn service_name(org_id: &str) -> String {
    format!("io.rewst.remote_agent_{org_id}")
}

#[cfg(all(unix, not(target_os = "macos")))]
pub fn service_name(org_id: &str) -> String {
    format!("rewst_remote_agent_{org_id}")
}

#[cfg(windows)]
mod platform {
    use super::*;

    pub fn program_directory(org_id: &str) -> PathBuf {
        let root = std::env::var("PROGRAMFILES").unwrap_or_else(|_| r"C:\Program Files".into());
        PathBuf::from(root).join("RewstRemoteAgent").join(org_id)
    }

    pub fn data_directory(org_id: &str) -> PathBuf {
        let root = std::env::var("PROGRAMDATA").unwrap_or_else(|_| r"C:\ProgramData".into());
        PathBuf::from(root).join("RewstRemoteAgent").join(org_id)
    }

    pub fn scripts_root() -> PathBuf {
        let drive = std::env::var("SYSTEMDRIVE").unwrap_or_else(|_| "C:".into());
        PathBuf::from(format!("{drive}\\"))
            .join("RewstRemoteAgent")
            .join("scripts")
    }

    pub fn agent_executable_path(org_id: &str) -> PathBuf {
        program_directory(org_id).join(format!("rewst_remote_agent_{org_id}.win.exe"))
    }

    pub fn service_executable_path(org_id: &str) -> PathBuf {
        program_directory(org_id).join(format!("rewst_windows_service_{org_id}.win.exe"))
    }

    pub fn service_manager_path(org_id: &str) -> PathBuf {
        program_directory(org_id).join(format!("rewst_service_manager_{org_id}.win.exe"))
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::*;

    pub fn program_directory(org_id: &str) -> PathBuf {
        PathBuf::from("/usr/local/bin")
            .join("rewst_remote_agent")
            .join(org_id)
    }

    pub fn data_directory(org_id: &str) -> PathBuf {
        PathBuf::from("/Library/Application Support")
            .join("rewst_remote_agent")
            .join(org_id)
    }

    pub fn scripts_root() -> PathBuf {
        std::env::temp_dir().join("rewst_remote_agent").join("scripts")
    }

    pub fn agent_executable_path(org_id: &str) -> PathBuf {
        program_directory(org_id).join("rewst_remote_agent.mac-os.bin")
    }

    pub fn service_executable_path(org_id: &str) -> PathBuf {
        agent_executable_path(org_id)
    }

    pub fn service_manager_path(org_id: &str) -> PathBuf {
        agent_executable_path(org_id)
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
mod platform {
    use super::*;

    pub fn program_directory(org_id: &str) -> PathBuf {
        PathBuf::from("/usr/local/bin")
            .join("rewst_remote_agent")
            .join(org_id)
    }

    pub fn data_directory(org_id: &str) -> PathBuf {
        PathBuf::from("/etc").join("rewst_remote_agent").join(org_id)
    }

    pub fn scripts_root() -> PathBuf {
        std::env::temp_dir().join("rewst_remote_agent").join("scripts")
    }

    pub fn agent_executable_path(org_id: &str) -> PathBuf {
        program_directory(org_id).join("rewst_remote_agent.linux.bin")
    }

    pub fn service_executable_path(org_id: &str) -> PathBuf {
        agent_executable_path(org_id)
    }

    pub fn service_manager_path(org_id: &str) -> PathBuf {
        agent_executable_path(org_id)
    }
}

use platform::{
    agent_executable_path, data_directory, scripts_root, service_executable_path,
    service_manager_path,
};
