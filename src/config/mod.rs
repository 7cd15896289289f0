use std::{collections::HashSet, fs, net::SocketAddr};

use log::{debug, trace};
use pingora::server::configuration::{Opt, ServerConf};
use pingora_error::{Error, ErrorType::*, OrErr, Result};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::branch::{Company, Permission, PermissionSet};

pub mod etcd;

#[derive(Default, Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = "Config::validate_config"))]
pub struct Config {
    #[serde(default)]
    pub pingora: ServerConf,

    #[validate(nested)]
    pub admin: Admin,

    #[serde(default)]
    pub storage: StorageType,
    #[validate(nested)]
    pub etcd: Option<Etcd>,

    pub log: Option<Log>,

    #[validate(nested)]
    #[serde(default)]
    pub companies: Vec<CompanyConfig>,
}

// Config file load and validation
impl Config {
    pub fn load_from_yaml<P>(path: P) -> Result<Self>
    where
        P: AsRef<std::path::Path> + std::fmt::Display,
    {
        let conf_str = fs::read_to_string(&path).or_err_with(ReadError, || {
            format!("Unable to read conf file from {path}")
        })?;
        debug!("Conf file read from {path}");
        Self::from_yaml(&conf_str)
    }

    // config file load entry point
    pub fn load_yaml_with_opt_override(opt: &Opt) -> Result<Self> {
        if let Some(path) = &opt.conf {
            let mut conf = Self::load_from_yaml(path)?;
            conf.merge_with_opt(opt);
            Ok(conf)
        } else {
            Error::e_explain(ReadError, "No path specified")
        }
    }

    pub fn from_yaml(conf_str: &str) -> Result<Self> {
        trace!("Read conf file: {conf_str}");
        let conf: Config = serde_yaml::from_str(conf_str).or_err_with(ReadError, || {
            format!("Unable to parse yaml conf {conf_str}")
        })?;

        conf.validate()
            .or_err_with(FileReadError, || "Conf file valid failed")?;

        Ok(conf)
    }

    pub fn merge_with_opt(&mut self, opt: &Opt) {
        if opt.daemon {
            self.pingora.daemon = true;
        }
    }

    fn validate_config(&self) -> Result<(), ValidationError> {
        self.validate_storage()?;
        self.validate_company_ids()
    }

    fn validate_storage(&self) -> Result<(), ValidationError> {
        if self.storage == StorageType::Etcd && self.etcd.is_none() {
            Err(ValidationError::new("etcd_required_for_etcd_storage"))
        } else {
            Ok(())
        }
    }

    fn validate_company_ids(&self) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for company in &self.companies {
            if !seen.insert(company.id) {
                let mut err = ValidationError::new("duplicate_company_id");
                err.add_param("id".into(), &company.id);
                return Err(err);
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Admin {
    pub address: SocketAddr,
    #[validate(length(min = 1))]
    #[validate(nested)]
    pub api_keys: Vec<ApiKey>,
}

impl Default for Admin {
    fn default() -> Self {
        Self {
            address: SocketAddr::from(([127, 0, 0, 1], 9180)),
            api_keys: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ApiKey {
    #[validate(length(min = 16))]
    pub key: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl ApiKey {
    pub fn permission_set(&self) -> PermissionSet {
        PermissionSet::new(self.permissions.iter().copied())
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Memory,
    Etcd,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct Etcd {
    #[validate(length(min = 1))]
    pub host: Vec<String>,
    #[serde(default = "Etcd::default_prefix")]
    pub prefix: String,
    pub timeout: Option<u32>,
    pub connect_timeout: Option<u32>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Etcd {
    fn default_prefix() -> String {
        "/company-admin".to_string()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Log {
    pub path: String,
    pub level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct CompanyConfig {
    pub id: u64,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[serde(default)]
    pub name: String,
}

impl From<&CompanyConfig> for Company {
    fn from(cfg: &CompanyConfig) -> Self {
        Self {
            id: cfg.id,
            client_id: cfg.client_id.clone(),
            name: cfg.name.clone(),
        }
    }
}
