//! Engine tunables as static descriptor tables.
//!
//! The host sees one flat `engine_config_*` attribute per tunable while the
//! remote nests them (`{"mysql": {"connect_timeout": 10}}`). Each
//! [`Tunable`] records both locations plus the value kind and its accepted
//! range, so flattening, expansion, schema generation and validation are
//! all driven from the same table.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::attr::{keep_or_update, Attr};
use crate::client::EngineType;
use crate::schema::{Attribute, AttributeType, Usage, ValueValidator};

/// Value kind and accepted range of a tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TunableKind {
    /// Integer, optionally bounded (inclusive).
    Int(Option<(i64, i64)>),
    /// Float, bounded (inclusive).
    Float(f64, f64),
    /// Boolean.
    Bool,
    /// String restricted to a fixed set.
    OneOf(&'static [&'static str]),
    /// String with a length range and a pattern.
    Pattern {
        /// Minimum length.
        min_len: usize,
        /// Maximum length.
        max_len: usize,
        /// Regular expression the value must match.
        regex: &'static str,
    },
}

/// One engine tunable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tunable {
    /// Host attribute name.
    pub attribute: &'static str,
    /// Location in the remote `engine_config` object.
    pub path: &'static [&'static str],
    /// Value kind.
    pub kind: TunableKind,
    /// Whether the remote fills in a default when unset. Non-computed
    /// tunables are always sent so that removing them clears them.
    pub computed: bool,
}

const fn int(attribute: &'static str, path: &'static [&'static str], min: i64, max: i64) -> Tunable {
    Tunable {
        attribute,
        path,
        kind: TunableKind::Int(Some((min, max))),
        computed: true,
    }
}

const fn float(attribute: &'static str, path: &'static [&'static str], min: f64, max: f64) -> Tunable {
    Tunable {
        attribute,
        path,
        kind: TunableKind::Float(min, max),
        computed: true,
    }
}

const fn boolean(attribute: &'static str, path: &'static [&'static str]) -> Tunable {
    Tunable {
        attribute,
        path,
        kind: TunableKind::Bool,
        computed: true,
    }
}

const fn one_of(
    attribute: &'static str,
    path: &'static [&'static str],
    values: &'static [&'static str],
) -> Tunable {
    Tunable {
        attribute,
        path,
        kind: TunableKind::OneOf(values),
        computed: true,
    }
}

const fn pattern(
    attribute: &'static str,
    path: &'static [&'static str],
    min_len: usize,
    max_len: usize,
    regex: &'static str,
) -> Tunable {
    Tunable {
        attribute,
        path,
        kind: TunableKind::Pattern {
            min_len,
            max_len,
            regex,
        },
        computed: true,
    }
}

/// MySQL tunables.
pub static MYSQL_TUNABLES: &[Tunable] = &[
    int("engine_config_binlog_retention_period", &["binlog_retention_period"], 600, 86400),
    int("engine_config_mysql_connect_timeout", &["mysql", "connect_timeout"], 2, 3600),
    pattern(
        "engine_config_mysql_default_time_zone",
        &["mysql", "default_time_zone"],
        2,
        100,
        r"^([-+][\d:]*|[\w/]*)$",
    ),
    float(
        "engine_config_mysql_group_concat_max_len",
        &["mysql", "group_concat_max_len"],
        4.0,
        1.8446744073709552e19,
    ),
    int(
        "engine_config_mysql_information_schema_stats_expiry",
        &["mysql", "information_schema_stats_expiry"],
        900,
        31536000,
    ),
    int(
        "engine_config_mysql_innodb_change_buffer_max_size",
        &["mysql", "innodb_change_buffer_max_size"],
        0,
        50,
    ),
    int("engine_config_mysql_innodb_flush_neighbors", &["mysql", "innodb_flush_neighbors"], 0, 2),
    int("engine_config_mysql_innodb_ft_min_token_size", &["mysql", "innodb_ft_min_token_size"], 0, 16),
    Tunable {
        attribute: "engine_config_mysql_innodb_ft_server_stopword_table",
        path: &["mysql", "innodb_ft_server_stopword_table"],
        kind: TunableKind::Pattern {
            min_len: 0,
            max_len: 1024,
            regex: r"^.+/.+$",
        },
        computed: false,
    },
    int(
        "engine_config_mysql_innodb_lock_wait_timeout",
        &["mysql", "innodb_lock_wait_timeout"],
        1,
        3600,
    ),
    int(
        "engine_config_mysql_innodb_log_buffer_size",
        &["mysql", "innodb_log_buffer_size"],
        1048576,
        4294967295,
    ),
    int(
        "engine_config_mysql_innodb_online_alter_log_max_size",
        &["mysql", "innodb_online_alter_log_max_size"],
        65536,
        1099511627776,
    ),
    int("engine_config_mysql_innodb_read_io_threads", &["mysql", "innodb_read_io_threads"], 1, 64),
    boolean(
        "engine_config_mysql_innodb_rollback_on_timeout",
        &["mysql", "innodb_rollback_on_timeout"],
    ),
    int(
        "engine_config_mysql_innodb_thread_concurrency",
        &["mysql", "innodb_thread_concurrency"],
        0,
        1000,
    ),
    int("engine_config_mysql_innodb_write_io_threads", &["mysql", "innodb_write_io_threads"], 1, 64),
    int("engine_config_mysql_interactive_timeout", &["mysql", "interactive_timeout"], 30, 604800),
    one_of(
        "engine_config_mysql_internal_tmp_mem_storage_engine",
        &["mysql", "internal_tmp_mem_storage_engine"],
        &["TempTable", "MEMORY"],
    ),
    int(
        "engine_config_mysql_max_allowed_packet",
        &["mysql", "max_allowed_packet"],
        102400,
        1073741824,
    ),
    int(
        "engine_config_mysql_max_heap_table_size",
        &["mysql", "max_heap_table_size"],
        1048576,
        1073741824,
    ),
    int("engine_config_mysql_net_buffer_length", &["mysql", "net_buffer_length"], 1024, 1048576),
    int("engine_config_mysql_net_read_timeout", &["mysql", "net_read_timeout"], 1, 3600),
    int("engine_config_mysql_net_write_timeout", &["mysql", "net_write_timeout"], 1, 3600),
    int("engine_config_mysql_sort_buffer_size", &["mysql", "sort_buffer_size"], 32768, 1073741824),
    pattern(
        "engine_config_mysql_sql_mode",
        &["mysql", "sql_mode"],
        0,
        1024,
        r"^[A-Z_]*(,[A-Z_]+)*$",
    ),
    boolean("engine_config_mysql_sql_require_primary_key", &["mysql", "sql_require_primary_key"]),
    int("engine_config_mysql_tmp_table_size", &["mysql", "tmp_table_size"], 1048576, 1073741824),
    int("engine_config_mysql_wait_timeout", &["mysql", "wait_timeout"], 1, 2147483),
];

/// PostgreSQL tunables.
pub static POSTGRESQL_TUNABLES: &[Tunable] = &[
    float(
        "engine_config_pg_autovacuum_analyze_scale_factor",
        &["pg", "autovacuum_analyze_scale_factor"],
        0.0,
        1.0,
    ),
    int(
        "engine_config_pg_autovacuum_analyze_threshold",
        &["pg", "autovacuum_analyze_threshold"],
        0,
        2147483647,
    ),
    int("engine_config_pg_autovacuum_max_workers", &["pg", "autovacuum_max_workers"], 1, 20),
    int("engine_config_pg_autovacuum_naptime", &["pg", "autovacuum_naptime"], 1, 86400),
    int(
        "engine_config_pg_autovacuum_vacuum_cost_delay",
        &["pg", "autovacuum_vacuum_cost_delay"],
        -1,
        100,
    ),
    int(
        "engine_config_pg_autovacuum_vacuum_cost_limit",
        &["pg", "autovacuum_vacuum_cost_limit"],
        -1,
        10000,
    ),
    float(
        "engine_config_pg_autovacuum_vacuum_scale_factor",
        &["pg", "autovacuum_vacuum_scale_factor"],
        0.0,
        1.0,
    ),
    int(
        "engine_config_pg_autovacuum_vacuum_threshold",
        &["pg", "autovacuum_vacuum_threshold"],
        0,
        2147483647,
    ),
    int("engine_config_pg_bgwriter_delay", &["pg", "bgwriter_delay"], 10, 10000),
    int("engine_config_pg_bgwriter_flush_after", &["pg", "bgwriter_flush_after"], 0, 2048),
    int("engine_config_pg_bgwriter_lru_maxpages", &["pg", "bgwriter_lru_maxpages"], 0, 1073741823),
    float("engine_config_pg_bgwriter_lru_multiplier", &["pg", "bgwriter_lru_multiplier"], 0.0, 10.0),
    int("engine_config_pg_deadlock_timeout", &["pg", "deadlock_timeout"], 500, 1800000),
    one_of(
        "engine_config_pg_default_toast_compression",
        &["pg", "default_toast_compression"],
        &["lz4", "pglz"],
    ),
    int(
        "engine_config_pg_idle_in_transaction_session_timeout",
        &["pg", "idle_in_transaction_session_timeout"],
        0,
        604800000,
    ),
    boolean("engine_config_pg_jit", &["pg", "jit"]),
    int("engine_config_pg_max_files_per_process", &["pg", "max_files_per_process"], 1000, 4096),
    int("engine_config_pg_max_locks_per_transaction", &["pg", "max_locks_per_transaction"], 64, 6400),
    int(
        "engine_config_pg_max_logical_replication_workers",
        &["pg", "max_logical_replication_workers"],
        4,
        64,
    ),
    int("engine_config_pg_max_parallel_workers", &["pg", "max_parallel_workers"], 0, 96),
    int(
        "engine_config_pg_max_parallel_workers_per_gather",
        &["pg", "max_parallel_workers_per_gather"],
        0,
        96,
    ),
    int(
        "engine_config_pg_max_pred_locks_per_transaction",
        &["pg", "max_pred_locks_per_transaction"],
        64,
        5120,
    ),
    int("engine_config_pg_max_replication_slots", &["pg", "max_replication_slots"], 8, 64),
    int(
        "engine_config_pg_max_slot_wal_keep_size",
        &["pg", "max_slot_wal_keep_size"],
        -1,
        2147483647,
    ),
    int("engine_config_pg_max_stack_depth", &["pg", "max_stack_depth"], 2097152, 6291456),
    int(
        "engine_config_pg_max_standby_archive_delay",
        &["pg", "max_standby_archive_delay"],
        1,
        43200000,
    ),
    int(
        "engine_config_pg_max_standby_streaming_delay",
        &["pg", "max_standby_streaming_delay"],
        1,
        43200000,
    ),
    int("engine_config_pg_max_wal_senders", &["pg", "max_wal_senders"], 20, 64),
    int("engine_config_pg_max_worker_processes", &["pg", "max_worker_processes"], 8, 96),
    one_of(
        "engine_config_pg_password_encryption",
        &["pg", "password_encryption"],
        &["md5", "scram-sha-256"],
    ),
    int(
        "engine_config_pg_pg_partman_bgw_interval",
        &["pg", "pg_partman_bgw.interval"],
        3600,
        604800,
    ),
    pattern(
        "engine_config_pg_pg_partman_bgw_role",
        &["pg", "pg_partman_bgw.role"],
        0,
        64,
        r"^[_A-Za-z0-9][-._A-Za-z0-9]{0,63}$",
    ),
    boolean(
        "engine_config_pg_pg_stat_monitor_pgsm_enable_query_plan",
        &["pg", "pg_stat_monitor.pgsm_enable_query_plan"],
    ),
    int(
        "engine_config_pg_pg_stat_monitor_pgsm_max_buckets",
        &["pg", "pg_stat_monitor.pgsm_max_buckets"],
        1,
        10,
    ),
    one_of(
        "engine_config_pg_pg_stat_statements_track",
        &["pg", "pg_stat_statements.track"],
        &["all", "top", "none"],
    ),
    int("engine_config_pg_temp_file_limit", &["pg", "temp_file_limit"], -1, 2147483647),
    pattern("engine_config_pg_timezone", &["pg", "timezone"], 0, 64, r"^[\w/]*$"),
    int(
        "engine_config_pg_track_activity_query_size",
        &["pg", "track_activity_query_size"],
        1024,
        10240,
    ),
    one_of(
        "engine_config_pg_track_commit_timestamp",
        &["pg", "track_commit_timestamp"],
        &["off", "on"],
    ),
    one_of(
        "engine_config_pg_track_functions",
        &["pg", "track_functions"],
        &["all", "pl", "none"],
    ),
    one_of("engine_config_pg_track_io_timing", &["pg", "track_io_timing"], &["off", "on"]),
    Tunable {
        attribute: "engine_config_pg_wal_sender_timeout",
        path: &["pg", "wal_sender_timeout"],
        kind: TunableKind::Int(None),
        computed: true,
    },
    int("engine_config_pg_wal_writer_delay", &["pg", "wal_writer_delay"], 10, 200),
    boolean("engine_config_pg_stat_monitor_enable", &["pg_stat_monitor_enable"]),
    int(
        "engine_config_pglookout_max_failover_replication_time_lag",
        &["pglookout", "max_failover_replication_time_lag"],
        10,
        999999,
    ),
    float(
        "engine_config_shared_buffers_percentage",
        &["shared_buffers_percentage"],
        20.0,
        60.0,
    ),
    int("engine_config_work_mem", &["work_mem"], 1, 1024),
];

/// The tunable table of an engine.
pub fn tunables(engine: EngineType) -> &'static [Tunable] {
    match engine {
        EngineType::Mysql => MYSQL_TUNABLES,
        EngineType::Postgresql => POSTGRESQL_TUNABLES,
    }
}

impl Tunable {
    /// Schema attribute for the host.
    pub fn schema_attribute(&self) -> Attribute {
        let usage = if self.computed {
            Usage::OptionalComputed
        } else {
            Usage::Optional
        };
        let (attr_type, validators) = match self.kind {
            TunableKind::Int(range) => (
                AttributeType::Int64,
                range
                    .map(|(min, max)| vec![ValueValidator::IntBetween(min, max)])
                    .unwrap_or_default(),
            ),
            TunableKind::Float(min, max) => (
                AttributeType::Float64,
                vec![ValueValidator::FloatBetween(min, max)],
            ),
            TunableKind::Bool => (AttributeType::Bool, Vec::new()),
            TunableKind::OneOf(values) => (
                AttributeType::String,
                vec![ValueValidator::OneOf(
                    values.iter().map(|v| v.to_string()).collect(),
                )],
            ),
            TunableKind::Pattern {
                min_len,
                max_len,
                regex,
            } => (
                AttributeType::String,
                vec![
                    ValueValidator::LengthBetween(min_len, max_len),
                    ValueValidator::Regex(regex.to_string()),
                ],
            ),
        };

        validators
            .into_iter()
            .fold(Attribute::new(attr_type, usage), Attribute::with_validator)
    }

    /// Coerce a remote or host number into the tunable's numeric kind.
    fn normalize(&self, value: Value) -> Value {
        match (&self.kind, &value) {
            (TunableKind::Float(..), Value::Number(n)) => {
                n.as_f64().map(Value::from).unwrap_or(value)
            }
            (TunableKind::Int(_), Value::Number(n)) if n.as_i64().is_none() => n
                .as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| Value::from(f as i64))
                .unwrap_or(value),
            _ => value,
        }
    }

    fn lookup<'v>(&self, config: &'v Value) -> Option<&'v Value> {
        self.path
            .iter()
            .try_fold(config, |node, key| node.get(key))
            .filter(|v| !v.is_null())
    }

    fn insert(&self, config: &mut Map<String, Value>, value: Value) {
        let Some((last, parents)) = self.path.split_last() else {
            return;
        };
        let mut node = config;
        for key in parents {
            let entry = node
                .entry(key.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            let Value::Object(next) = entry else {
                return;
            };
            node = next;
        }
        node.insert(last.to_string(), value);
    }
}

/// Values of an engine's tunables, keyed by host attribute name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    values: BTreeMap<&'static str, Attr<Value>>,
}

impl EngineConfig {
    /// Every tunable of `engine`, all null.
    pub fn empty(engine: EngineType) -> Self {
        Self {
            values: tunables(engine)
                .iter()
                .map(|t| (t.attribute, Attr::Null))
                .collect(),
        }
    }

    /// Pick the engine's tunables out of a host state object.
    pub fn from_state(
        engine: EngineType,
        state: &Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        let mut values = BTreeMap::new();
        for tunable in tunables(engine) {
            let raw = state.get(tunable.attribute).cloned().unwrap_or(Value::Null);
            let value = Attr::<Value>::try_from_value(raw)?.map(|v| tunable.normalize(v));
            values.insert(tunable.attribute, value);
        }
        Ok(Self { values })
    }

    /// Write every tunable into a host state object.
    pub fn write_state(&self, state: &mut Map<String, Value>) {
        for (name, value) in &self.values {
            let encoded = serde_json::to_value(value).unwrap_or(Value::Null);
            state.insert(name.to_string(), encoded);
        }
    }

    /// Project the remote `engine_config` object.
    pub fn flatten(&mut self, engine: EngineType, remote: &Value, preserve_known: bool) {
        for tunable in tunables(engine) {
            let observed = Attr::from_option(
                tunable
                    .lookup(remote)
                    .map(|v| tunable.normalize(v.clone())),
            );
            let current = self.values.remove(tunable.attribute).unwrap_or_default();
            self.values.insert(
                tunable.attribute,
                keep_or_update(current, observed, preserve_known),
            );
        }
    }

    /// Build the remote `engine_config` object.
    ///
    /// Unknown values are left out. Null values of computed tunables are
    /// left out too, letting the remote keep its default; non-computed
    /// tunables are always sent, as null when unset.
    pub fn expand(&self, engine: EngineType) -> Value {
        let mut config = Map::new();
        for tunable in tunables(engine) {
            match self.values.get(tunable.attribute) {
                Some(Attr::Known(v)) => tunable.insert(&mut config, v.clone()),
                Some(Attr::Unknown) if tunable.computed => {}
                Some(Attr::Null) | None if tunable.computed => {}
                _ => tunable.insert(&mut config, Value::Null),
            }
        }
        Value::Object(config)
    }

    /// Field-wise [`keep_or_update`] from `other`.
    pub fn copy_from(&mut self, other: &EngineConfig, preserve_known: bool) {
        for (name, value) in self.values.iter_mut() {
            let incoming = other.values.get(name).cloned().unwrap_or_default();
            let current = std::mem::take(value);
            *value = keep_or_update(current, incoming, preserve_known);
        }
    }

    /// Value of one tunable.
    pub fn get(&self, attribute: &str) -> Option<&Attr<Value>> {
        self.values.get(attribute)
    }

    /// Set one tunable. Names outside the table are ignored.
    pub fn set(&mut self, attribute: &str, value: Attr<Value>) {
        if let Some(slot) = self.values.get_mut(attribute) {
            *slot = value;
        }
    }

    /// Attribute names whose values differ.
    pub fn changed(&self, other: &EngineConfig) -> Vec<&'static str> {
        self.values
            .iter()
            .filter(|(name, value)| other.values.get(*name) != Some(*value))
            .map(|(name, _)| *name)
            .collect()
    }

    /// Mark unset tunables the remote will compute as unknown.
    pub fn mark_computed_unknown(&mut self, engine: EngineType) {
        for tunable in tunables(engine).iter().filter(|t| t.computed) {
            if let Some(value) = self.values.get_mut(tunable.attribute) {
                if value.is_null() {
                    *value = Attr::Unknown;
                }
            }
        }
    }

    /// Replace unknown values, and nulls of computed tunables, with the
    /// values in `prior`.
    pub fn use_prior_for_unknown(&mut self, engine: EngineType, prior: &EngineConfig) {
        for tunable in tunables(engine) {
            let Some(value) = self.values.get_mut(tunable.attribute) else {
                continue;
            };
            if value.is_unknown() || (tunable.computed && value.is_null()) {
                if let Some(previous) = prior.values.get(tunable.attribute) {
                    *value = previous.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const STOPWORD: &str = "engine_config_mysql_innodb_ft_server_stopword_table";

    #[test]
    fn test_plan_time_unknowns() {
        let mut prior = EngineConfig::empty(EngineType::Mysql);
        prior.set("engine_config_mysql_wait_timeout", Attr::Known(json!(28800)));
        prior.set(STOPWORD, Attr::Known(json!("db/stopwords")));

        let mut planned = EngineConfig::empty(EngineType::Mysql);
        planned.mark_computed_unknown(EngineType::Mysql);
        assert_eq!(
            planned.get("engine_config_mysql_wait_timeout"),
            Some(&Attr::Unknown)
        );
        assert_eq!(planned.get(STOPWORD), Some(&Attr::Null));

        let mut update = EngineConfig::empty(EngineType::Mysql);
        update.use_prior_for_unknown(EngineType::Mysql, &prior);
        assert_eq!(
            update.get("engine_config_mysql_wait_timeout"),
            Some(&Attr::Known(json!(28800)))
        );
        // Removing the stopword table from configuration clears it.
        assert_eq!(update.get(STOPWORD), Some(&Attr::Null));
        assert_eq!(update.changed(&prior), vec![STOPWORD]);
    }

    #[test]
    fn test_table_sizes() {
        assert_eq!(MYSQL_TUNABLES.len(), 28);
        assert_eq!(POSTGRESQL_TUNABLES.len(), 47);
        let optional_only: Vec<_> = MYSQL_TUNABLES
            .iter()
            .filter(|t| !t.computed)
            .map(|t| t.attribute)
            .collect();
        assert_eq!(optional_only, vec![STOPWORD]);
    }

    #[test]
    fn test_flatten_nested_remote_config() {
        let mut config = EngineConfig::empty(EngineType::Mysql);
        config.flatten(
            EngineType::Mysql,
            &json!({
                "binlog_retention_period": 600,
                "mysql": {"connect_timeout": 10, "group_concat_max_len": 1024, "sql_mode": null}
            }),
            false,
        );

        assert_eq!(
            config.get("engine_config_binlog_retention_period"),
            Some(&Attr::Known(json!(600)))
        );
        assert_eq!(
            config.get("engine_config_mysql_connect_timeout"),
            Some(&Attr::Known(json!(10)))
        );
        assert_eq!(
            config.get("engine_config_mysql_group_concat_max_len"),
            Some(&Attr::Known(json!(1024.0)))
        );
        assert_eq!(config.get("engine_config_mysql_sql_mode"), Some(&Attr::Null));
    }

    #[test]
    fn test_flatten_preserves_known_values() {
        let mut config = EngineConfig::empty(EngineType::Mysql);
        config.set("engine_config_mysql_connect_timeout", Attr::Known(json!(20)));
        config.set("engine_config_mysql_wait_timeout", Attr::Unknown);

        let remote = json!({"mysql": {"connect_timeout": 10, "wait_timeout": 28800}});
        config.flatten(EngineType::Mysql, &remote, true);

        assert_eq!(
            config.get("engine_config_mysql_connect_timeout"),
            Some(&Attr::Known(json!(20)))
        );
        assert_eq!(
            config.get("engine_config_mysql_wait_timeout"),
            Some(&Attr::Known(json!(28800)))
        );
    }

    #[test]
    fn test_expand_skips_unknown_and_sends_stopword_null() {
        let mut config = EngineConfig::empty(EngineType::Mysql);
        config.set("engine_config_mysql_connect_timeout", Attr::Known(json!(10)));
        config.set("engine_config_mysql_wait_timeout", Attr::Unknown);
        config.set(STOPWORD, Attr::Unknown);

        assert_eq!(
            config.expand(EngineType::Mysql),
            json!({"mysql": {"connect_timeout": 10, "innodb_ft_server_stopword_table": null}})
        );

        config.set(STOPWORD, Attr::Known(json!("db/table")));
        assert_eq!(
            config.expand(EngineType::Mysql)["mysql"]["innodb_ft_server_stopword_table"],
            "db/table"
        );
    }

    #[test]
    fn test_expand_postgresql_dotted_keys() {
        let mut config = EngineConfig::empty(EngineType::Postgresql);
        config.set("engine_config_pg_pg_partman_bgw_interval", Attr::Known(json!(3600)));
        config.set("engine_config_pglookout_max_failover_replication_time_lag", Attr::Known(json!(60)));
        config.set("engine_config_work_mem", Attr::Known(json!(4)));

        assert_eq!(
            config.expand(EngineType::Postgresql),
            json!({
                "pg": {"pg_partman_bgw.interval": 3600},
                "pglookout": {"max_failover_replication_time_lag": 60},
                "work_mem": 4
            })
        );
    }

    #[test]
    fn test_state_round_trip_and_changes() {
        let state = json!({
            "engine_config_mysql_connect_timeout": 10,
            "engine_config_mysql_sql_mode": crate::attr::UNKNOWN_VALUE,
            "label": "ignored"
        });
        let config =
            EngineConfig::from_state(EngineType::Mysql, state.as_object().unwrap()).unwrap();
        assert_eq!(config.get("engine_config_mysql_sql_mode"), Some(&Attr::Unknown));
        assert_eq!(config.get("label"), None);

        let mut written = Map::new();
        config.write_state(&mut written);
        assert_eq!(written.len(), MYSQL_TUNABLES.len());
        assert_eq!(written["engine_config_mysql_connect_timeout"], 10);

        let mut other = config.clone();
        other.set("engine_config_mysql_connect_timeout", Attr::Known(json!(11)));
        assert_eq!(config.changed(&other), vec!["engine_config_mysql_connect_timeout"]);
    }

    #[test]
    fn test_schema_attribute_carries_validators() {
        let attr = MYSQL_TUNABLES[1].schema_attribute();
        assert_eq!(attr.usage, Usage::OptionalComputed);
        assert_eq!(attr.validators, vec![ValueValidator::IntBetween(2, 3600)]);

        let stopword = MYSQL_TUNABLES
            .iter()
            .find(|t| t.attribute == STOPWORD)
            .unwrap()
            .schema_attribute();
        assert_eq!(stopword.usage, Usage::Optional);
    }
}
