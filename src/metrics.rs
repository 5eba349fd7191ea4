//! Счётчики декодирования контролов в формате Prometheus.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::error::DecodeErrorKind;

/// Счётчики реестра (thread-safe, lock-free).
#[derive(Debug, Default)]
pub struct DecodeMetrics {
    /// Всего регистраций декодеров, включая замены.
    registrations_total: AtomicU64,
    /// Регистрации, заменившие существующий декодер для того же OID.
    overrides_total: AtomicU64,
    /// Controls returned as generic because no decoder is registered.
    passthrough_total: AtomicU64,
    /// Successful typed decodes: oid -> count.
    decoded: DashMap<String, AtomicU64>,
    /// Failed decodes: (oid, kind) -> count.
    errors: DashMap<(String, DecodeErrorKind), AtomicU64>,
}

impl DecodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_registration(&self, replaced: bool) {
        self.registrations_total.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.overrides_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn inc_passthrough(&self) {
        self.passthrough_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_decoded(&self, oid: &str) {
        if let Some(counter) = self.decoded.get(oid) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.decoded
            .entry(oid.to_string())
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_error(&self, oid: &str, kind: DecodeErrorKind) {
        self.errors
            .entry((oid.to_string(), kind))
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn registrations(&self) -> u64 {
        self.registrations_total.load(Ordering::Relaxed)
    }

    pub fn overrides(&self) -> u64 {
        self.overrides_total.load(Ordering::Relaxed)
    }

    pub fn passthrough(&self) -> u64 {
        self.passthrough_total.load(Ordering::Relaxed)
    }

    pub fn decoded(&self, oid: &str) -> u64 {
        self.decoded
            .get(oid)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn errors(&self, oid: &str, kind: DecodeErrorKind) -> u64 {
        self.errors
            .get(&(oid.to_string(), kind))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Рендер метрик в текстовом формате Prometheus (exposition format).
    /// Labelled series are sorted so the output is stable.
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("# HELP ldap_controls_registrations_total Total decoder registrations, including overrides.\n");
        out.push_str("# TYPE ldap_controls_registrations_total counter\n");
        out.push_str(&format!("ldap_controls_registrations_total {}\n", self.registrations()));

        out.push_str("# HELP ldap_controls_overrides_total Registrations that replaced an existing decoder.\n");
        out.push_str("# TYPE ldap_controls_overrides_total counter\n");
        out.push_str(&format!("ldap_controls_overrides_total {}\n", self.overrides()));

        out.push_str("# HELP ldap_controls_passthrough_total Controls left generic because no decoder is registered.\n");
        out.push_str("# TYPE ldap_controls_passthrough_total counter\n");
        out.push_str(&format!("ldap_controls_passthrough_total {}\n", self.passthrough()));

        out.push_str("# HELP ldap_controls_decoded_total Controls decoded into a typed representation by OID.\n");
        out.push_str("# TYPE ldap_controls_decoded_total counter\n");
        let mut decoded: Vec<(String, u64)> = self
            .decoded
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        decoded.sort();
        for (oid, count) in decoded {
            out.push_str(&format!(
                "ldap_controls_decoded_total{{oid=\"{}\"}} {}\n",
                escape_label(&oid),
                count
            ));
        }

        out.push_str("# HELP ldap_controls_decode_errors_total Decode failures by OID and error kind.\n");
        out.push_str("# TYPE ldap_controls_decode_errors_total counter\n");
        let mut errors: Vec<(String, &'static str, u64)> = self
            .errors
            .iter()
            .map(|e| {
                let (oid, kind) = e.key();
                (oid.clone(), kind.as_str(), e.value().load(Ordering::Relaxed))
            })
            .collect();
        errors.sort();
        for (oid, kind, count) in errors {
            out.push_str(&format!(
                "ldap_controls_decode_errors_total{{oid=\"{}\",kind=\"{}\"}} {}\n",
                escape_label(&oid),
                kind,
                count
            ));
        }

        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
