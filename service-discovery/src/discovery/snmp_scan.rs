//! SNMP check type scan.

use autochecks::Value;
use tracing::{debug, trace};

use super::{Diagnostics, OnError};
use crate::domain::Host;
use crate::engine::DiscoveryEngine;
use crate::registry::ScanContext;
use crate::{Error, Result};

/// System description OID, queried once before the scan functions run.
pub const SYS_DESCR_OID: &str = ".1.3.6.1.2.1.1.1.0";

/// System object id OID.
pub const SYS_OBJECT_ID_OID: &str = ".1.3.6.1.2.1.1.2.0";

impl DiscoveryEngine {
    /// Determine the SNMP check types that apply to a device.
    ///
    /// Every SNMP check type whose scan function reports a match is
    /// returned, plus every SNMP check type without a scan function. The
    /// result is sorted.
    pub fn snmp_scan(&self, host: &Host, on_error: OnError, diag: &mut Diagnostics) -> Result<Vec<String>> {
        let scan = ScanContext::new(host, self.data.as_ref());

        if self.rules.snmp_without_sys_descr(&host.name) {
            // Scan functions expect both values to exist.
            scan.preset(SYS_DESCR_OID, Some(String::new()));
            scan.preset(SYS_OBJECT_ID_OID, Some(String::new()));
        } else if scan.oid(SYS_DESCR_OID)?.is_none() {
            return Err(Error::snmp(format!(
                "Cannot fetch system description OID {SYS_DESCR_OID}"
            )));
        }

        let mut positive = Vec::new();
        let mut default_found = Vec::new();

        for descriptor in self.registry.iter() {
            let check_type = descriptor.name.as_str();
            if !descriptor.uses_snmp || self.settings.ignored_checktypes.contains(check_type) {
                continue;
            }

            let Some(scan_function) = self.registry.scan_function(check_type) else {
                default_found.push(check_type.to_string());
                continue;
            };

            match scan_function(&scan) {
                Ok(Value::Bool(true)) => positive.push(check_type.to_string()),
                Ok(Value::Str(s)) if !s.is_empty() => positive.push(check_type.to_string()),
                Ok(Value::Bool(false) | Value::Str(_) | Value::None) => {}
                Ok(other) => match on_error {
                    OnError::Raise => {
                        return Err(Error::ScanAborted(format!(
                            "scan function of {check_type} returns invalid type {}",
                            other.type_name()
                        )));
                    }
                    OnError::Warn => diag.warn(format!(
                        "SNMP scan function of {check_type} returns invalid type {}",
                        other.type_name()
                    )),
                    OnError::Ignore => {}
                },
                Err(e @ (Error::ScanAborted(_) | Error::CheckTimeout)) => return Err(e),
                Err(e) => {
                    let context = format!("Exception in SNMP scan function of {check_type}");
                    on_error.handle(diag, &context, e)?;
                }
            }
        }

        debug!(host = %host.name, found = ?positive, "SNMP scan found");
        if !default_found.is_empty() {
            trace!(host = %host.name, types = ?default_found, "Without scan function");
        }

        let mut found = positive;
        found.extend(default_found);
        found.sort();
        Ok(found)
    }
}
