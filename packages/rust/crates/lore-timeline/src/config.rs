/// Field values stamped onto entries created by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDefaults {
    /// Title used when the summary has neither a title nor keywords.
    pub fallback_title: String,
    /// Title used for always-active timeline entries without a title.
    pub always_active_title: String,
    /// Host insertion order.
    pub order: u32,
    /// Host insertion position.
    pub position: u32,
    /// Host insertion depth.
    pub depth: u32,
    /// Prefix put in front of event entry titles.
    pub event_title_prefix: String,
    /// Host `scanDepth` stamped on event entries.
    pub event_scan_depth: u32,
}

impl Default for EntryDefaults {
    fn default() -> Self {
        Self {
            fallback_title: "Timeline Entry".to_string(),
            always_active_title: "📅 Main Timeline".to_string(),
            order: 100,
            position: 4,
            depth: 4,
            event_title_prefix: "📅 ".to_string(),
            event_scan_depth: 2,
        }
    }
}
