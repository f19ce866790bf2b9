// Build a label (or annotation) map inline: `klabel!(MODULE_NAME_LABEL => name, CHANNEL_LABEL => "fast")`
#[macro_export]
macro_rules! klabel {
    ($($key:expr => $val:expr),* $(,)?) => {
        Some(std::collections::BTreeMap::from([$(($key.to_string(), $val.to_string())),*]))
    };
}

pub use klabel;
