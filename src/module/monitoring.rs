//! Site monitoring module.
//!
//! Configures the local monitoring probes that watch the compute entry
//! point, transfer hosts, and storage endpoints. Probe groups name a target
//! host followed by probe short names; short names resolve to
//! fully-qualified metric ids through a memoized index over the metric
//! catalog. Several options fan out across host lists: a single entry
//! applies to every host, otherwise the entry count must match the host
//! count exactly.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::config::{Context, IniConfig, OptionSpec, OptionValue, ValueKind};
use crate::error::{CollaboratorError, ConfigError};
use crate::external::{ProbeControl, ProcessProbeControl};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Monitoring";

const DEFAULT_SERVICE_CERT: &str = "/etc/grid-security/monitor/hostcert.pem";
const DEFAULT_SERVICE_KEY: &str = "/etc/grid-security/monitor/hostkey.pem";
const DEFAULT_SERVICE_PROXY: &str = "/etc/grid-security/monitor/monitor-proxy.pem";

// Probe whose metrics feed the central accounting service. Sites opt in or
// out explicitly through enable_reporting.
const REPORTING_PROBE: &str = "reporting";

/// Catalog of known probes and the metric ids each one provides.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for MetricCatalog {
    fn default() -> Self {
        let entry = |name: &str, metrics: &[&str]| {
            (
                name.to_string(),
                metrics.iter().map(ToString::to_string).collect(),
            )
        };
        Self {
            entries: vec![
                entry("ping", &["grid.ping"]),
                entry(
                    "certificate",
                    &["grid.certificate.expiry", "grid.certificate.crl"],
                ),
                entry("gridftp", &["grid.transfer.gridftp"]),
                entry("batch", &["grid.batch.submit", "grid.batch.status"]),
                entry("storage", &["grid.storage.read", "grid.storage.write"]),
                entry("reporting", &["grid.reporting.heartbeat"]),
            ],
        }
    }
}

impl MetricCatalog {
    /// Creates a catalog from explicit probe-to-metrics entries.
    #[must_use]
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self { entries }
    }
}

/// Configuration module for site monitoring probes.
pub struct MonitoringModule {
    options: OptionSet,
    applicability: Applicability,
    catalog: MetricCatalog,
    // Probe short name -> metric ids, built on first lookup.
    metric_index: Option<BTreeMap<String, Vec<String>>>,
    probes: Box<dyn ProbeControl>,
}

impl fmt::Debug for MonitoringModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitoringModule")
            .field("options", &self.options)
            .field("applicability", &self.applicability)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Default for MonitoringModule {
    fn default() -> Self {
        Self::new(MetricCatalog::default(), Box::new(ProcessProbeControl::default()))
    }
}

impl MonitoringModule {
    /// Creates the module with the given metric catalog and probe control.
    #[must_use]
    pub fn new(catalog: MetricCatalog, probes: Box<dyn ProbeControl>) -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("enable_local_probes")
                    .optional()
                    .kind(ValueKind::Bool)
                    .default_value(OptionValue::Bool(true)),
                OptionSpec::new("probe_groups").optional().kind(ValueKind::Groups),
                OptionSpec::new("ce_hosts").optional().kind(ValueKind::List),
                OptionSpec::new("transfer_hosts").optional().kind(ValueKind::List),
                OptionSpec::new("transfer_dir")
                    .optional()
                    .kind(ValueKind::List)
                    .default_value(OptionValue::List(vec![String::from("/tmp")])),
                OptionSpec::new("storage_hosts").optional().kind(ValueKind::List),
                OptionSpec::new("storage_dir").optional().kind(ValueKind::List),
                OptionSpec::new("storage_web_path").optional().kind(ValueKind::List),
                OptionSpec::new("service_cert")
                    .optional()
                    .default_str(DEFAULT_SERVICE_CERT),
                OptionSpec::new("service_key")
                    .optional()
                    .default_str(DEFAULT_SERVICE_KEY),
                OptionSpec::new("service_proxy")
                    .optional()
                    .default_str(DEFAULT_SERVICE_PROXY),
                OptionSpec::new("user_proxy").optional().default_str(""),
                OptionSpec::new("enable_reporting").kind(ValueKind::Bool),
            ]),
            applicability: Applicability::Disabled,
            catalog,
            metric_index: None,
            probes,
        }
    }

    /// Returns the probe index, building it from the catalog on first use.
    fn metric_index(&mut self) -> &BTreeMap<String, Vec<String>> {
        self.metric_index.get_or_insert_with(|| {
            debug!(section = SECTION, probes = self.catalog.entries.len(), "Building metric index");
            self.catalog
                .entries
                .iter()
                .map(|(name, metrics)| (name.clone(), metrics.clone()))
                .collect()
        })
    }

    fn probe_groups(&self) -> Vec<Vec<String>> {
        self.options
            .get("probe_groups")
            .and_then(OptionValue::as_groups)
            .map(<[Vec<String>]>::to_vec)
            .unwrap_or_default()
    }

    /// Checks that `option` fans out over `hosts` entries.
    fn fan_out_issue(
        option: &str,
        values: usize,
        hosts: usize,
        broadcast: bool,
    ) -> Option<ValidationIssue> {
        if values == hosts || (broadcast && values == 1) {
            return None;
        }
        let expected = if broadcast {
            format!("1 or {hosts}")
        } else {
            hosts.to_string()
        };
        Some(ValidationIssue::option(
            SECTION,
            option,
            format!("Expected {expected} entries to match {hosts} hosts, got {values}"),
        ))
    }

    fn check_host_list(&self, option: &str, issues: &mut Vec<ValidationIssue>) {
        for entry in self.options.list_value(option) {
            if !checks::valid_host_port(entry) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    option,
                    format!("Invalid host specification: {entry}"),
                ));
            }
        }
    }

    fn check_credentials(&self, issues: &mut Vec<ValidationIssue>) {
        let proxy_set = !checks::blank(self.options.str_value("user_proxy"));
        let service_changed = self.options.str_value("service_cert") != DEFAULT_SERVICE_CERT
            || self.options.str_value("service_key") != DEFAULT_SERVICE_KEY
            || self.options.str_value("service_proxy") != DEFAULT_SERVICE_PROXY;

        if proxy_set && service_changed {
            issues.push(ValidationIssue::section(
                SECTION,
                "Configure either user_proxy or the service_cert/service_key/service_proxy \
                 settings, not both",
            ));
        } else if proxy_set {
            warn!(
                section = SECTION,
                "user_proxy takes precedence over the default service certificate settings"
            );
        }
    }

    fn credential_args(&self) -> Vec<(String, String)> {
        let user_proxy = self.options.str_value("user_proxy");
        if checks::blank(user_proxy) {
            vec![
                (
                    String::from("service-cert"),
                    self.options.str_value("service_cert").to_string(),
                ),
                (
                    String::from("service-key"),
                    self.options.str_value("service_key").to_string(),
                ),
                (
                    String::from("service-proxy"),
                    self.options.str_value("service_proxy").to_string(),
                ),
            ]
        } else {
            vec![(String::from("proxy-file"), user_proxy.to_string())]
        }
    }
}

impl ConfigModule for MonitoringModule {
    fn section_name(&self) -> &'static str {
        SECTION
    }

    fn applicability(&self) -> Applicability {
        self.applicability
    }

    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError> {
        self.applicability = Applicability::from_section(config, SECTION);
        if !self.applicability.is_active() {
            debug!(section = SECTION, "Section absent, disabled, or ignored");
            return Vec::new();
        }

        let errors = self.options.parse_section(config, SECTION, ctx);
        if !errors.is_empty() {
            return errors;
        }

        // transfer_hosts inherits the compute-entry-point hosts when unset.
        if self.options.list_value("transfer_hosts").is_empty() {
            let ce_hosts = self.options.list_value("ce_hosts").to_vec();
            if !ce_hosts.is_empty() {
                debug!(section = SECTION, "transfer_hosts defaulted from ce_hosts");
                self.options.set("transfer_hosts", OptionValue::List(ce_hosts));
            }
        }
        Vec::new()
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        if !self.applicability.is_active() {
            return Vec::new();
        }

        let mut issues = Vec::new();

        self.check_host_list("ce_hosts", &mut issues);
        self.check_host_list("transfer_hosts", &mut issues);
        self.check_host_list("storage_hosts", &mut issues);

        let transfer_hosts = self.options.list_value("transfer_hosts").len();
        if transfer_hosts > 0 {
            issues.extend(Self::fan_out_issue(
                "transfer_dir",
                self.options.list_value("transfer_dir").len(),
                transfer_hosts,
                true,
            ));
        }

        let storage_hosts = self.options.list_value("storage_hosts").len();
        if storage_hosts > 0 {
            issues.extend(Self::fan_out_issue(
                "storage_dir",
                self.options.list_value("storage_dir").len(),
                storage_hosts,
                false,
            ));
            let web_paths = self.options.list_value("storage_web_path").len();
            if web_paths > 0 {
                issues.extend(Self::fan_out_issue(
                    "storage_web_path",
                    web_paths,
                    storage_hosts,
                    false,
                ));
            }
        }

        self.check_credentials(&mut issues);

        let groups = self.probe_groups();
        let index = self.metric_index().clone();
        for group in &groups {
            let Some((host, probe_names)) = group.split_first() else {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "probe_groups",
                    "Empty probe group".to_string(),
                ));
                continue;
            };
            if !checks::valid_host_port(host) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "probe_groups",
                    format!("Invalid probe host: {host}"),
                ));
            }
            for name in probe_names {
                if !index.contains_key(name) {
                    issues.push(ValidationIssue::option(
                        SECTION,
                        "probe_groups",
                        format!("Unknown probe name: {name}"),
                    ));
                }
            }
        }

        issues
    }

    fn apply(&mut self, _view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        if !self.applicability.is_active() {
            return Ok(());
        }
        if !self.options.bool_value("enable_local_probes") {
            info!(section = SECTION, "Local probes disabled, nothing to enable");
            return Ok(());
        }

        let groups = self.probe_groups();
        let args = self.credential_args();
        let reporting = self.options.bool_value("enable_reporting");
        if !reporting {
            info!(section = SECTION, "Reporting disabled, skipping reporting probes");
        }

        let mut plan: Vec<(String, Vec<String>)> = Vec::new();
        {
            let index = self.metric_index();
            for group in &groups {
                let Some((host, probe_names)) = group.split_first() else {
                    continue;
                };
                let metrics: Vec<String> = probe_names
                    .iter()
                    .filter(|name| reporting || name.as_str() != REPORTING_PROBE)
                    .filter_map(|name| index.get(name))
                    .flatten()
                    .cloned()
                    .collect();
                plan.push((host.clone(), metrics));
            }
        }

        for (host, metrics) in &plan {
            self.probes.enable_metrics(host, metrics, &args)?;
            info!(section = SECTION, host, metrics = metrics.len(), "Probes enabled");
        }
        Ok(())
    }

    fn resolved_options(&self) -> BTreeMap<String, OptionValue> {
        self.options.snapshot()
    }

    fn exported_attributes(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use crate::external::MockProbeControl;

    use super::*;

    fn ctx() -> Context {
        Context::new(true, "ce.example.org")
    }

    fn module() -> MonitoringModule {
        MonitoringModule::new(MetricCatalog::default(), Box::new(MockProbeControl::new()))
    }

    fn parsed(body: &str) -> MonitoringModule {
        let ini = IniConfig::parse(&format!(
            "[Monitoring]\nenabled = true\nenable_reporting = false\n{body}"
        ))
        .unwrap();
        let mut m = module();
        assert!(m.parse(&ini, &ctx()).is_empty());
        m
    }

    #[test]
    fn test_transfer_hosts_default_from_ce_hosts() {
        let m = parsed("ce_hosts = ce1.example.org, ce2.example.org\n");
        assert_eq!(
            m.resolved_options().get("transfer_hosts").unwrap().to_string(),
            "ce1.example.org,ce2.example.org"
        );
    }

    #[test]
    fn test_explicit_transfer_hosts_are_kept() {
        let m = parsed("ce_hosts = ce1.example.org\ntransfer_hosts = gw.example.org\n");
        assert_eq!(
            m.resolved_options().get("transfer_hosts").unwrap().to_string(),
            "gw.example.org"
        );
    }

    #[test]
    fn test_fan_out_broadcast_and_exact_pass() {
        let mut m = parsed(
            "ce_hosts = ce1.example.org, ce2.example.org, ce3.example.org\n\
             transfer_dir = /scratch\n\
             storage_hosts = se1.example.org, se2.example.org\n\
             storage_dir = /data/1, /data/2\n",
        );
        assert!(m.validate(&ResolvedView::default(), &ctx()).is_empty());
    }

    #[test]
    fn test_fan_out_mismatch_names_both_counts() {
        let mut m = parsed(
            "storage_hosts = se1.example.org, se2.example.org, se3.example.org\n\
             storage_dir = /data/1, /data/2\n",
        );
        let issues = m.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains('3'));
        assert!(issues[0].message.contains('2'));
    }

    #[test]
    fn test_broadcast_not_allowed_for_storage_dir() {
        let mut m = parsed(
            "storage_hosts = se1.example.org, se2.example.org\nstorage_dir = /data\n",
        );
        let issues = m.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("Expected 2"));
    }

    #[test]
    fn test_credential_exclusivity_is_an_error() {
        let mut m = parsed(
            "user_proxy = /tmp/x509up_u100\nservice_cert = /etc/grid-security/other.pem\n",
        );
        let issues = m.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("not both"));
    }

    #[test]
    fn test_user_proxy_with_default_service_settings_is_accepted() {
        let mut m = parsed("user_proxy = /tmp/x509up_u100\n");
        assert!(m.validate(&ResolvedView::default(), &ctx()).is_empty());
        assert_eq!(
            m.credential_args(),
            vec![(String::from("proxy-file"), String::from("/tmp/x509up_u100"))]
        );
    }

    #[test]
    fn test_unknown_probe_name_is_reported() {
        let mut m = parsed("probe_groups = (ce1.example.org, ping, nosuchprobe)\n");
        let issues = m.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("nosuchprobe"));
    }

    #[test]
    fn test_metric_index_is_built_once() {
        let mut m = module();
        assert!(m.metric_index.is_none());
        let first = m.metric_index().clone();
        assert!(m.metric_index.is_some());
        assert_eq!(m.metric_index().clone(), first);
        assert_eq!(
            first.get("certificate").map(Vec::len),
            Some(2),
        );
    }

    #[test]
    fn test_apply_calls_probe_control_once_per_group() {
        let mut probes = MockProbeControl::new();
        probes
            .expect_enable_metrics()
            .with(
                eq("ce1.example.org"),
                eq(vec![String::from("grid.ping")]),
                eq(vec![(
                    String::from("proxy-file"),
                    String::from("/tmp/x509up_u100"),
                )]),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));
        probes
            .expect_enable_metrics()
            .with(
                eq("se1.example.org"),
                eq(vec![
                    String::from("grid.storage.read"),
                    String::from("grid.storage.write"),
                ]),
                eq(vec![(
                    String::from("proxy-file"),
                    String::from("/tmp/x509up_u100"),
                )]),
            )
            .times(1)
            .returning(|_, _, _| Ok(()));

        let ini = IniConfig::parse(
            "[Monitoring]\n\
             enabled = true\n\
             enable_reporting = true\n\
             user_proxy = /tmp/x509up_u100\n\
             probe_groups = (ce1.example.org, ping), (se1.example.org, storage)\n",
        )
        .unwrap();
        let mut m = MonitoringModule::new(MetricCatalog::default(), Box::new(probes));
        assert!(m.parse(&ini, &ctx()).is_empty());
        m.apply(&ResolvedView::default(), &ctx()).unwrap();
    }

    #[test]
    fn test_reporting_metrics_withheld_when_reporting_disabled() {
        let mut probes = MockProbeControl::new();
        probes
            .expect_enable_metrics()
            .withf(|_, metrics, _| metrics == [String::from("grid.ping")])
            .times(1)
            .returning(|_, _, _| Ok(()));

        let ini = IniConfig::parse(
            "[Monitoring]\n\
             enabled = true\n\
             enable_reporting = false\n\
             user_proxy = /tmp/x509up_u100\n\
             probe_groups = (ce1.example.org, ping, reporting)\n",
        )
        .unwrap();
        let mut m = MonitoringModule::new(MetricCatalog::default(), Box::new(probes));
        assert!(m.parse(&ini, &ctx()).is_empty());
        m.apply(&ResolvedView::default(), &ctx()).unwrap();
    }

    #[test]
    fn test_apply_skips_when_local_probes_disabled() {
        let mut probes = MockProbeControl::new();
        probes.expect_enable_metrics().times(0);

        let ini = IniConfig::parse(
            "[Monitoring]\n\
             enabled = true\n\
             enable_reporting = true\n\
             enable_local_probes = false\n\
             probe_groups = (ce1.example.org, ping)\n",
        )
        .unwrap();
        let mut m = MonitoringModule::new(MetricCatalog::default(), Box::new(probes));
        assert!(m.parse(&ini, &ctx()).is_empty());
        m.apply(&ResolvedView::default(), &ctx()).unwrap();
    }

    #[test]
    fn test_missing_enable_reporting_is_a_parse_error() {
        let ini = IniConfig::parse("[Monitoring]\nenabled = true\n").unwrap();
        let mut m = module();
        let errors = m.parse(&ini, &ctx());
        assert_eq!(errors.len(), 1);
        assert!(
            matches!(errors[0], ConfigError::MissingMandatory { ref name } if name == "enable_reporting")
        );
    }
}
