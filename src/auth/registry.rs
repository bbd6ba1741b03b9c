//! Widget registry keyed by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::otp::TotpSettings;
use crate::auth::widget::AuthWidget;
use crate::auth::widgets::{PasswordWidget, TotpWidget};

/// The set of widgets endpoints may enable. Filled once at startup.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    widgets: BTreeMap<&'static str, Arc<dyn AuthWidget>>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `password` and `totp` widgets.
    pub fn builtin(totp: &TotpSettings) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PasswordWidget));
        registry.register(Arc::new(TotpWidget::new(totp.digits)));
        registry
    }

    /// Add a widget, replacing any widget already registered under its name.
    pub fn register(&mut self, widget: Arc<dyn AuthWidget>) {
        self.widgets.insert(widget.name(), widget);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn AuthWidget>> {
        self.widgets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.widgets.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.widgets.keys().copied()
    }

    /// Pick a widget for an endpoint: `requested` if the endpoint enables
    /// it, otherwise the endpoint's first widget.
    pub fn select(&self, enabled: &[String], requested: Option<&str>) -> Option<&Arc<dyn AuthWidget>> {
        requested
            .filter(|name| enabled.iter().any(|e| e.as_str() == *name))
            .and_then(|name| self.get(name))
            .or_else(|| enabled.iter().find_map(|name| self.get(name)))
    }
}

impl std::fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.widgets.keys()).finish()
    }
}
