pub(crate) mod configurator;
pub(crate) mod timers;
