//! Shared UI icons.

use console::Emoji;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[WARN]");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "");
