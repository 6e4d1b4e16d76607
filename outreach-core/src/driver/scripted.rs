//! # Scripted Driver
//!
//! An in-process [`PageDriver`] implementation that models the target
//! application: login page, captcha flag, arithmetic 2FA challenge, search
//! results with connect buttons and a note modal, connections listing and
//! per-profile message transcripts.
//!
//! Used by the integration tests (failure injection, interaction counting)
//! and by the demo binary as a dry-run backend. When a [`Ledger`] is
//! attached, accepting a connection fires a delayed auto-greeting write
//! from a spawned task, so the storage layer sees a concurrent writer.

use crate::driver::{PageDriver, PageElement};
use crate::error::DriverError;
use crate::ledger::Ledger;
use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// One profile seeded into the simulated application.
#[derive(Debug, Clone)]
pub struct SimProfile {
    pub id: i64,
    pub name: String,
    pub title: String,
    pub company: String,
    pub connected: bool,
    requested: bool,
}

impl SimProfile {
    pub fn new(id: i64, name: &str, title: &str, company: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            title: title.to_string(),
            company: company.to_string(),
            connected: false,
            requested: false,
        }
    }

    /// Marks the profile as already connected before the run starts.
    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }
}

struct SimState {
    base_url: String,
    url: String,
    authed: bool,
    captcha: bool,
    two_factor: bool,
    reject_otp: bool,
    auto_accept: bool,
    idle_times_out: bool,
    username: String,
    password: String,
    puzzle: Option<(String, i64)>,
    banner: Option<String>,
    profiles: Vec<SimProfile>,
    inputs: HashMap<String, String>,
    focused: Option<String>,
    note_open_for: Option<i64>,
    sent_notes: HashMap<i64, String>,
    transcripts: HashMap<i64, Vec<(String, String)>>,
    hidden: HashSet<String>,
    fail_plan: HashMap<String, u32>,
}

impl SimState {
    fn path(&self) -> String {
        self.url
            .strip_prefix(&self.base_url)
            .unwrap_or(&self.url)
            .to_string()
    }

    fn profile_mut(&mut self, id: i64) -> Option<&mut SimProfile> {
        self.profiles.iter_mut().find(|p| p.id == id)
    }

    fn fresh_puzzle(&mut self) {
        let mut rng = rand::thread_rng();
        let n1: i64 = rng.gen_range(1..=20);
        let n2: i64 = rng.gen_range(1..=20);
        let (op, answer) = match rng.gen_range(0..3) {
            0 => ("+", n1 + n2),
            1 => ("-", n1 - n2),
            _ => ("*", n1 * n2),
        };
        self.puzzle = Some((format!("{} {} {}", n1, op, n2), answer));
    }

    /// Whether a single-node selector resolves on the current page.
    fn has_node(&self, selector: &str) -> bool {
        let path = self.path();
        match selector {
            "#username-field" | "#password-field" | "#login-submit" => {
                path.starts_with("/login")
            }
            "#captcha-box" | ".captcha" => path.starts_with("/login") && self.captcha,
            ".error" => {
                (path.starts_with("/login") || path.starts_with("/2fa"))
                    && self.banner.is_some()
            }
            "#puzzle-text" | "#otp-field" | "#otp-submit" => path.starts_with("/2fa"),
            "#search-input" => path.starts_with("/search"),
            "#note-text" | "#send-note" => {
                path.starts_with("/search") && self.note_open_for.is_some()
            }
            "#message-text" | "#send-btn" | "#message-container" => {
                path.starts_with("/messages")
            }
            s => {
                if let Some(id) = parse_connect_selector(s) {
                    path.starts_with("/search")
                        && self.profiles.iter().any(|p| p.id == id && !p.connected)
                } else {
                    false
                }
            }
        }
    }
}

/// Extracts N from `.connect-btn[data-id='N']`.
fn parse_connect_selector(selector: &str) -> Option<i64> {
    selector
        .strip_prefix(".connect-btn[data-id='")?
        .strip_suffix("']")?
        .parse()
        .ok()
}

/// Extracts the profile id from a `/messages?id=N` path.
fn parse_message_target(path: &str) -> Option<i64> {
    path.split("id=").nth(1)?.parse().ok()
}

pub struct ScriptedDriver {
    state: Arc<Mutex<SimState>>,
    interactions: Arc<AtomicU64>,
    ledger: Option<Arc<Ledger>>,
}

impl ScriptedDriver {
    pub fn new(base_url: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                base_url: base_url.trim_end_matches('/').to_string(),
                url: format!("{}/login", base_url.trim_end_matches('/')),
                authed: false,
                captcha: false,
                two_factor: true,
                reject_otp: false,
                auto_accept: true,
                idle_times_out: false,
                username: "admin".to_string(),
                password: "password123".to_string(),
                puzzle: None,
                banner: None,
                profiles: Vec::new(),
                inputs: HashMap::new(),
                focused: None,
                note_open_for: None,
                sent_notes: HashMap::new(),
                transcripts: HashMap::new(),
                hidden: HashSet::new(),
                fail_plan: HashMap::new(),
            })),
            interactions: Arc::new(AtomicU64::new(0)),
            ledger: None,
        }
    }

    pub fn with_credentials(self, username: &str, password: &str) -> Self {
        {
            let mut st = self.state.lock().unwrap();
            st.username = username.to_string();
            st.password = password.to_string();
        }
        self
    }

    pub fn with_profile(self, profile: SimProfile) -> Self {
        self.state.lock().unwrap().profiles.push(profile);
        self
    }

    /// Puts a captcha checkpoint on the login page.
    pub fn with_captcha(self) -> Self {
        self.state.lock().unwrap().captcha = true;
        self
    }

    /// Login goes straight to the dashboard, no 2FA challenge.
    pub fn without_two_factor(self) -> Self {
        self.state.lock().unwrap().two_factor = false;
        self
    }

    /// The challenge page rejects every submitted answer.
    pub fn rejecting_otp(self) -> Self {
        self.state.lock().unwrap().reject_otp = true;
        self
    }

    /// Connection requests stay pending instead of auto-accepting.
    pub fn without_auto_accept(self) -> Self {
        self.state.lock().unwrap().auto_accept = false;
        self
    }

    /// `wait_idle` simulates a UI that never settles.
    pub fn with_idle_timeout(self) -> Self {
        self.state.lock().unwrap().idle_times_out = true;
        self
    }

    /// Shares the bot's ledger so accepted connections fire the delayed
    /// auto-greeting write, like the original target application does.
    pub fn with_ledger(mut self, ledger: Arc<Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// The next `times` lookups of `selector` report it missing.
    pub fn fail_find(&self, selector: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .fail_plan
            .insert(selector.to_string(), times);
    }

    /// Marks an element as non-visible until it is scrolled into view.
    pub fn hide(&self, selector: &str) {
        self.state.lock().unwrap().hidden.insert(selector.to_string());
    }

    /// Starts the session already authenticated on the dashboard.
    pub fn mark_logged_in(&self) {
        let mut st = self.state.lock().unwrap();
        st.authed = true;
        st.url = format!("{}/dashboard", st.base_url);
    }

    /// Count of element-level interactions (find/click/type/scroll). Lets
    /// tests assert that a deduplicated call never touched the page.
    pub fn interaction_count(&self) -> u64 {
        self.interactions.load(Ordering::SeqCst)
    }

    pub fn typed(&self, selector: &str) -> Option<String> {
        self.state.lock().unwrap().inputs.get(selector).cloned()
    }

    /// Note text submitted with the connection request for `id`.
    pub fn note_sent_to(&self, id: i64) -> Option<String> {
        self.state.lock().unwrap().sent_notes.get(&id).cloned()
    }

    pub fn requested_ids(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .filter(|p| p.requested)
            .map(|p| p.id)
            .collect()
    }

    pub fn is_connected(&self, id: i64) -> bool {
        self.state
            .lock()
            .unwrap()
            .profiles
            .iter()
            .any(|p| p.id == id && p.connected)
    }

    pub fn transcript(&self, id: i64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .transcripts
            .get(&id)
            .map(|msgs| msgs.iter().map(|(_, c)| c.clone()).collect())
            .unwrap_or_default()
    }

    fn element(&self, kind: ElemKind) -> Box<dyn PageElement> {
        Box::new(ScriptedElement {
            kind,
            state: Arc::clone(&self.state),
            interactions: Arc::clone(&self.interactions),
            ledger: self.ledger.clone(),
        })
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        if !url.starts_with(&st.base_url) {
            return Err(DriverError::Navigation {
                url: url.to_string(),
                reason: "host unreachable in scripted session".to_string(),
            }
            .into());
        }
        let path = url[st.base_url.len()..].to_string();
        // Unauthenticated sessions are bounced to the login page.
        let dest = if !st.authed && !path.starts_with("/login") && !path.starts_with("/2fa") {
            "/login".to_string()
        } else if st.authed && (path.is_empty() || path == "/") {
            "/dashboard".to_string()
        } else {
            path
        };
        st.url = format!("{}{}", st.base_url, dest);
        st.focused = None;
        st.note_open_for = None;
        st.banner = None;
        st.inputs.clear();
        debug!("scripted: navigated to {}", st.url);
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn wait_for_load(&self) -> Result<()> {
        Ok(())
    }

    async fn wait_idle(&self, timeout: Duration) -> Result<()> {
        let times_out = self.state.lock().unwrap().idle_times_out;
        if times_out {
            Err(DriverError::SettleTimeout {
                timeout_ms: timeout.as_millis() as u64,
            }
            .into())
        } else {
            Ok(())
        }
    }

    async fn find_element(&self, selector: &str) -> Result<Box<dyn PageElement>> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        {
            let mut st = self.state.lock().unwrap();
            if let Some(remaining) = st.fail_plan.get_mut(selector) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(DriverError::Missing {
                        selector: selector.to_string(),
                    }
                    .into());
                }
            }
            if !st.has_node(selector) {
                return Err(DriverError::Missing {
                    selector: selector.to_string(),
                }
                .into());
            }
        }
        Ok(self.element(ElemKind::Node(selector.to_string())))
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let kinds: Vec<ElemKind> = {
            let st = self.state.lock().unwrap();
            let path = st.path();
            match selector {
                ".result-item" if path.starts_with("/search") => st
                    .profiles
                    .iter()
                    .map(|p| ElemKind::ResultItem(p.id))
                    .collect(),
                "#connection-list a" if path.starts_with("/connections") => st
                    .profiles
                    .iter()
                    .filter(|p| p.connected)
                    .map(|p| ElemKind::ConnectionLink(p.id))
                    .collect(),
                _ => Vec::new(),
            }
        };
        Ok(kinds.into_iter().map(|k| self.element(k)).collect())
    }

    async fn keyboard_type(&self, ch: char) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock().unwrap();
        match st.focused.clone() {
            Some(sel) => {
                st.inputs.entry(sel).or_default().push(ch);
                Ok(())
            }
            None => Err(DriverError::Interaction {
                selector: "<keyboard>".to_string(),
                reason: "no element focused".to_string(),
            }
            .into()),
        }
    }

    async fn keyboard_press(&self, _key: &str) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scroll_by(&self, _dx: i64, _dy: i64) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

enum ElemKind {
    Node(String),
    ResultItem(i64),
    ConnectionLink(i64),
}

enum ClickEffect {
    None,
    AutoGreet { id: i64, name: String, company: String },
}

struct ScriptedElement {
    kind: ElemKind,
    state: Arc<Mutex<SimState>>,
    interactions: Arc<AtomicU64>,
    ledger: Option<Arc<Ledger>>,
}

impl ScriptedElement {
    fn selector(&self) -> String {
        match &self.kind {
            ElemKind::Node(s) => s.clone(),
            ElemKind::ResultItem(id) => format!(".result-item[{}]", id),
            ElemKind::ConnectionLink(id) => format!("#connection-list a[{}]", id),
        }
    }

    fn apply_click(&self, st: &mut SimState, selector: &str) -> ClickEffect {
        match selector {
            "#login-submit" => {
                let user = st.inputs.get("#username-field").cloned().unwrap_or_default();
                let pass = st.inputs.get("#password-field").cloned().unwrap_or_default();
                if user == st.username && pass == st.password {
                    st.banner = None;
                    if st.two_factor {
                        st.url = format!("{}/2fa", st.base_url);
                        st.fresh_puzzle();
                    } else {
                        st.authed = true;
                        st.url = format!("{}/dashboard", st.base_url);
                    }
                } else {
                    st.banner = Some("Invalid username or password".to_string());
                }
                ClickEffect::None
            }
            "#otp-submit" => {
                let answer = st.inputs.get("#otp-field").cloned().unwrap_or_default();
                let expected = st.puzzle.as_ref().map(|(_, a)| a.to_string());
                if !st.reject_otp && Some(answer.trim().to_string()) == expected {
                    st.authed = true;
                    st.banner = None;
                    st.puzzle = None;
                    st.url = format!("{}/dashboard", st.base_url);
                } else {
                    st.banner = Some("Incorrect answer, try again.".to_string());
                    st.fresh_puzzle();
                }
                ClickEffect::None
            }
            "#send-note" => {
                let note = st.inputs.remove("#note-text").unwrap_or_default();
                if let Some(id) = st.note_open_for.take() {
                    st.sent_notes.insert(id, note);
                    let auto = st.auto_accept;
                    if let Some(p) = st.profile_mut(id) {
                        p.requested = true;
                        if auto {
                            p.connected = true;
                            return ClickEffect::AutoGreet {
                                id,
                                name: p.name.clone(),
                                company: p.company.clone(),
                            };
                        }
                    }
                }
                ClickEffect::None
            }
            "#send-btn" => {
                let path = st.path();
                if let Some(id) = parse_message_target(&path) {
                    let content = st.inputs.remove("#message-text").unwrap_or_default();
                    st.transcripts
                        .entry(id)
                        .or_default()
                        .push(("bot".to_string(), content));
                }
                ClickEffect::None
            }
            s => {
                if let Some(id) = parse_connect_selector(s) {
                    st.note_open_for = Some(id);
                }
                ClickEffect::None
            }
        }
    }
}

#[async_trait]
impl PageElement for ScriptedElement {
    async fn click(&self) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let selector = self.selector();
        let effect = {
            let mut st = self.state.lock().unwrap();
            if st.hidden.contains(&selector) {
                return Err(DriverError::Obstructed { selector }.into());
            }
            self.apply_click(&mut st, &selector)
        };
        // The original application acknowledges an accepted connection
        // with a greeting written a moment later, from its own thread.
        if let ClickEffect::AutoGreet { id, name, company } = effect {
            if let Some(ledger) = self.ledger.clone() {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let content = format!(
                        "Hi {}, thanks for connecting! I'm interested in your work at {}. Hope you're having a great day!",
                        name, company
                    );
                    if ledger
                        .mark_message_sent(id, "user", "auto_greeting", &content)
                        .await
                        .is_ok()
                    {
                        let _ = ledger
                            .log_activity("Auto-Greeting", &format!("Received from {}", name))
                            .await;
                    }
                });
            }
        }
        Ok(())
    }

    async fn input(&self, text: &str) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let selector = self.selector();
        let mut st = self.state.lock().unwrap();
        st.inputs.insert(selector, text.to_string());
        Ok(())
    }

    async fn text(&self) -> Result<String> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().unwrap();
        let text = match &self.kind {
            ElemKind::Node(sel) => match sel.as_str() {
                "#puzzle-text" => st.puzzle.as_ref().map(|(t, _)| t.clone()).unwrap_or_default(),
                ".error" => st.banner.clone().unwrap_or_default(),
                "#message-container" => {
                    let path = st.path();
                    parse_message_target(&path)
                        .and_then(|id| st.transcripts.get(&id))
                        .map(|msgs| {
                            msgs.iter()
                                .map(|(_, c)| c.clone())
                                .collect::<Vec<_>>()
                                .join("\n")
                        })
                        .unwrap_or_default()
                }
                other => st.inputs.get(other).cloned().unwrap_or_default(),
            },
            ElemKind::ResultItem(id) => st
                .profiles
                .iter()
                .find(|p| p.id == *id)
                .map(|p| {
                    let status = if p.connected { "NETWORK SYNCED" } else { "CONNECT" };
                    format!("{}\n{} at {}\n{}", p.name, p.title, p.company, status)
                })
                .unwrap_or_default(),
            ElemKind::ConnectionLink(id) => st
                .profiles
                .iter()
                .find(|p| p.id == *id)
                .map(|p| p.name.clone())
                .unwrap_or_default(),
        };
        Ok(text)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let attr = match &self.kind {
            ElemKind::ResultItem(id) if name == "data-id" => Some(id.to_string()),
            ElemKind::ConnectionLink(id) if name == "href" => {
                Some(format!("/profile/{}", id))
            }
            _ => None,
        };
        Ok(attr)
    }

    async fn visible(&self) -> Result<bool> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().unwrap();
        Ok(!st.hidden.contains(&self.selector()))
    }

    async fn scroll_into_view(&self) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let selector = self.selector();
        self.state.lock().unwrap().hidden.remove(&selector);
        Ok(())
    }

    async fn focus(&self) -> Result<()> {
        self.interactions.fetch_add(1, Ordering::SeqCst);
        let selector = self.selector();
        self.state.lock().unwrap().focused = Some(selector);
        Ok(())
    }
}
