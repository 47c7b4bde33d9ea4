use crate::{DbConfig, Error, FieldNames, Result, ResultCursor, error::server_detail, escape};
use mysql::{Conn, Opts, OptsBuilder, prelude::Queryable};
use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};
use uuid::Uuid;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
const LIVENESS_PROBE: &str = "SELECT 1";
const NOT_CONNECTED: &str = "MySQL connection not established";

/// State the session lock guards: the native handle, the last-active
/// mark and the last server-reported error. The handle being `Some` is
/// the definition of "connected", the two can never disagree.
struct State {
    conn: Option<Conn>,
    last_active: Instant,
    last_error: Option<(u16, String)>,
}

/// One live connection to a MySQL server.
///
/// A session owns its native handle exclusively: the type is move-only
/// and the handle is released exactly once, on [`close`](Self::close) or
/// drop. Every state-touching operation serializes behind one internal
/// lock, so a `&Session` can be shared across threads; public entry
/// points acquire that lock exactly once and never call each other while
/// holding it.
///
/// ```no_run
/// use berth::{DbConfig, Session};
///
/// let session = Session::new(DbConfig::new("localhost", "app", "secret", "inventory"));
/// if session.connect() {
///     let affected = session
///         .execute_update("UPDATE users SET active = 1 WHERE name = 'tom'")
///         .expect("update failed");
///     println!("updated {affected} rows");
/// }
/// ```
pub struct Session {
    id: String,
    config: DbConfig,
    opts: Opts,
    created_at: Instant,
    state: Mutex<State>,
}

impl Session {
    /// Prepares an unconnected session: stores the parameters, generates
    /// the correlation identifier and fixes the connection options
    /// (connect/read/write timeouts, utf8mb4). Multi-statement execution
    /// stays disabled, single calls carry exactly one statement.
    pub fn new(config: DbConfig) -> Session {
        let id = Uuid::new_v4().simple().to_string();
        log::info!("creating session [{id}] to {}", config.connection_str());
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .tcp_connect_timeout(Some(CONNECT_TIMEOUT))
            .read_timeout(Some(READ_TIMEOUT))
            .write_timeout(Some(WRITE_TIMEOUT))
            .init(vec!["SET NAMES utf8mb4"]);
        let now = Instant::now();
        Session {
            id,
            config,
            opts: Opts::from(opts),
            created_at: now,
            state: Mutex::new(State {
                conn: None,
                last_active: now,
                last_error: None,
            }),
        }
    }

    /// Performs the handshake. Idempotent: reconnecting an already open
    /// handle would silently drop the live connection at the protocol
    /// layer, so an established session returns `true` without any
    /// network work. On failure the session stays unconnected and the
    /// reason is retrievable via [`last_error`](Self::last_error).
    pub fn connect(&self) -> bool {
        let mut state = self.state();
        if state.conn.is_some() {
            log::warn!("session [{}] is already connected", self.id);
            return true;
        }
        log::info!(
            "session [{}] connecting to {}",
            self.id,
            self.config.connection_str()
        );
        match Conn::new(self.opts.clone()) {
            Ok(conn) => {
                state.conn = Some(conn);
                note_success(&mut state);
                log::info!("session [{}] connected", self.id);
                true
            }
            Err(e) => {
                note_failure(&mut state, &e);
                log::error!("session [{}] failed to connect: {e}", self.id);
                false
            }
        }
    }

    /// Releases the native handle. Safe to call repeatedly, also run by
    /// drop.
    pub fn close(&self) {
        let mut state = self.state();
        if state.conn.take().is_some() {
            log::info!("session [{}] closed", self.id);
        }
    }

    /// Whether the handle exists, without touching the network.
    pub fn is_connected(&self) -> bool {
        self.state().conn.is_some()
    }

    /// Connected and answering a lightweight probe. Refreshes the
    /// last-active mark on success. A failed probe is observational: it
    /// logs and returns `false` without closing the session.
    pub fn is_valid(&self) -> bool {
        let mut state = self.state();
        self.probe_locked(&mut state)
    }

    /// Executes a result-producing statement and materializes the full
    /// result set.
    pub fn execute_query(&self, sql: &str) -> Result<ResultCursor> {
        self.execute(sql, true)
    }

    /// Executes an INSERT/UPDATE/DELETE style statement and returns the
    /// affected-row count.
    pub fn execute_update(&self, sql: &str) -> Result<u64> {
        self.execute(sql, false).map(|result| result.affected_rows())
    }

    /// Common execution primitive behind both statement shapes.
    fn execute(&self, sql: &str, is_query: bool) -> Result<ResultCursor> {
        let mut state = self.state();
        if !self.probe_locked(&mut state) {
            log::error!("session [{}] cannot execute a statement, no live connection", self.id);
            return Err(Error::NotConnected {
                id: self.id.clone(),
            });
        }
        log::debug!(
            "session [{}] executing {}: {sql}",
            self.id,
            if is_query { "query" } else { "update" },
        );
        let result = match state.conn.as_mut() {
            Some(conn) => run_statement(conn, sql, is_query),
            None => {
                return Err(Error::NotConnected {
                    id: self.id.clone(),
                });
            }
        };
        match result {
            Ok(cursor) => {
                note_success(&mut state);
                Ok(cursor)
            }
            Err(e) => {
                note_failure(&mut state, &e);
                log::error!(
                    "session [{}] failed to execute {}: {e}, sql: {sql}",
                    self.id,
                    if is_query { "query" } else { "update" },
                );
                Err(Error::execute(&e))
            }
        }
    }

    /// Opens a transaction; statements issued until [`commit`](Self::commit)
    /// or [`rollback`](Self::rollback) are provisional.
    pub fn begin_transaction(&self) -> bool {
        self.transaction_control("START TRANSACTION")
    }

    /// Makes the work since the last [`begin_transaction`](Self::begin_transaction)
    /// permanent. Commit is final: a later rollback does not undo it.
    pub fn commit(&self) -> bool {
        self.transaction_control("COMMIT")
    }

    /// Discards the work since the last [`begin_transaction`](Self::begin_transaction).
    pub fn rollback(&self) -> bool {
        self.transaction_control("ROLLBACK")
    }

    /// Transaction boundaries share one shape: exactly one control
    /// statement, boolean outcome, failure logged rather than raised.
    fn transaction_control(&self, statement: &str) -> bool {
        let mut state = self.state();
        let result = match state.conn.as_mut() {
            Some(conn) => {
                log::debug!("session [{}] {statement}", self.id);
                conn.query_drop(statement)
            }
            None => {
                log::error!(
                    "session [{}] is not connected, cannot run {statement}",
                    self.id
                );
                return false;
            }
        };
        match result {
            Ok(()) => {
                note_success(&mut state);
                true
            }
            Err(e) => {
                note_failure(&mut state, &e);
                log::error!("session [{}] failed to run {statement}: {e}", self.id);
                false
            }
        }
    }

    /// Most recent server-reported error text. Callable without a
    /// connection: unconnected sessions with no recorded failure answer
    /// with a fixed sentinel.
    pub fn last_error(&self) -> String {
        let state = self.state();
        match (&state.last_error, &state.conn) {
            (Some((_, message)), _) => message.clone(),
            (None, None) => NOT_CONNECTED.to_string(),
            (None, Some(_)) => String::new(),
        }
    }

    /// Most recent server errno, 0 when none exists or the failure never
    /// reached the server.
    pub fn last_error_code(&self) -> u16 {
        self.state()
            .last_error
            .as_ref()
            .map(|(code, _)| *code)
            .unwrap_or(0)
    }

    /// Escaped form of `raw` without surrounding quotes. Escaping rules
    /// are charset-dependent, so a live connection (which pinned utf8mb4)
    /// is required.
    pub fn escape_string(&self, raw: &str) -> Result<String> {
        self.require_connected("escape a string")?;
        Ok(escape::escape_str(raw))
    }

    /// Complete single-quoted literal for `raw`, under the same
    /// connection requirement as [`escape_string`](Self::escape_string).
    pub fn quote_string(&self, raw: &str) -> Result<String> {
        self.require_connected("quote a string")?;
        Ok(escape::quote_str(raw))
    }

    /// Immutable, lock-free.
    pub fn creation_time(&self) -> Instant {
        self.created_at
    }

    /// Refreshed by every successful operation; the basis for a pool's
    /// idle-eviction policy.
    pub fn last_active_time(&self) -> Instant {
        self.state().last_active
    }

    pub fn update_last_active_time(&self) {
        self.state().last_active = Instant::now();
    }

    /// Process-unique identifier, for logging and correlation only.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn probe_locked(&self, state: &mut State) -> bool {
        let Some(conn) = state.conn.as_mut() else {
            log::warn!("session [{}] is not connected", self.id);
            return false;
        };
        match conn.query_drop(LIVENESS_PROBE) {
            Ok(()) => {
                note_success(state);
                true
            }
            Err(e) => {
                note_failure(state, &e);
                log::error!("session [{}] liveness probe failed: {e}", self.id);
                false
            }
        }
    }

    fn require_connected(&self, action: &str) -> Result<()> {
        if self.state().conn.is_some() {
            Ok(())
        } else {
            log::error!("session [{}] is not connected, cannot {action}", self.id);
            Err(Error::NotConnected {
                id: self.id.clone(),
            })
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
        log::info!("session [{}] destroyed", self.id);
    }
}

fn note_success(state: &mut State) {
    state.last_active = Instant::now();
    state.last_error = None;
}

fn note_failure(state: &mut State, error: &mysql::Error) {
    state.last_error = Some(server_detail(error));
}

/// Runs one statement on the wire. Queries drain the server response into
/// client memory so the cursor outlives any further use of the handle; a
/// failure while fetching rows surfaces as an error, never as an empty
/// result.
fn run_statement(
    conn: &mut Conn,
    sql: &str,
    is_query: bool,
) -> std::result::Result<ResultCursor, mysql::Error> {
    let mut result = conn.query_iter(sql)?;
    if is_query {
        let names: FieldNames = result
            .columns()
            .as_ref()
            .iter()
            .map(|column| column.name_str().into_owned())
            .collect();
        let mut rows = Vec::new();
        for row in result.by_ref() {
            rows.push(row?.unwrap().into_boxed_slice());
        }
        Ok(ResultCursor::from_rows(names, rows))
    } else {
        Ok(ResultCursor::from_affected(result.affected_rows()))
    }
}
