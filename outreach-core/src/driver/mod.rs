//! # Page Automation Driver Contract
//!
//! The engine never talks to a concrete automation backend. Everything it
//! needs from a page is expressed by [`PageDriver`] and [`PageElement`];
//! backends (or the scripted fake in [`scripted`]) implement these traits.
//!
//! Every operation is fallible and the core never assumes retries or
//! debouncing underneath. Implementations must surface a missing element
//! as [`DriverError::Missing`](crate::error::DriverError::Missing) so
//! callers can distinguish "absent" from "broken".

pub mod scripted;

pub use scripted::{ScriptedDriver, SimProfile};

use crate::error::DriverError;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Capability contract for navigating and inspecting pages.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Location after the last navigation or in-page transition.
    async fn current_url(&self) -> Result<String>;

    /// Blocks until the page reports loaded.
    async fn wait_for_load(&self) -> Result<()>;

    /// Bounded wait for the UI to settle. Times out with
    /// [`DriverError::SettleTimeout`]; callers decide whether that is fatal.
    async fn wait_idle(&self, timeout: Duration) -> Result<()>;

    async fn find_element(&self, selector: &str) -> Result<Box<dyn PageElement>>;

    async fn find_elements(&self, selector: &str) -> Result<Vec<Box<dyn PageElement>>>;

    /// Emits a single keystroke into the currently focused element.
    async fn keyboard_type(&self, ch: char) -> Result<()>;

    /// Presses a named key (e.g. "Enter").
    async fn keyboard_press(&self, key: &str) -> Result<()>;

    /// Scrolls the viewport by the given offsets.
    async fn scroll_by(&self, dx: i64, dy: i64) -> Result<()>;
}

/// A located element on the current page.
#[async_trait]
pub trait PageElement: Send + Sync {
    async fn click(&self) -> Result<()>;

    /// Sets the element's value directly (no typing cadence).
    async fn input(&self, text: &str) -> Result<()>;

    async fn text(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn visible(&self) -> Result<bool>;

    async fn scroll_into_view(&self) -> Result<()>;

    async fn focus(&self) -> Result<()>;
}

/// Presence probe: maps [`DriverError::Missing`] to `None`, propagates
/// every other failure.
pub async fn try_find(
    driver: &dyn PageDriver,
    selector: &str,
) -> Result<Option<Box<dyn PageElement>>> {
    match driver.find_element(selector).await {
        Ok(el) => Ok(Some(el)),
        Err(e) => {
            if matches!(e.downcast_ref::<DriverError>(), Some(DriverError::Missing { .. })) {
                Ok(None)
            } else {
                Err(e)
            }
        }
    }
}
