pub const HELP: &str = "I'm a simple \"save now, read later\" bot.

How to save:
• In private chat: just send me a link and I'll save it.
• In group chats: use /save <link> (so I don't react to random messages).

Commands:
• /help - show this message
• /save <url> - save a link (required in groups)
• /rnd - send one random saved page and remove it from your list
• /del - delete a page:
  - /del            (show your list)
  - /del <number>   (delete by number from the list)
  - /del <url>      (delete by exact link)
• /list - show your saved pages (up to 20)
• /daily on|off - one random page every day
• /tz <Area/City> - your timezone for the daily page, e.g. /tz Europe/Berlin

Note:
After /rnd or the daily page, the sent page is deleted from your list (so you won't get repeats).";

pub const GREETING: &str = "Hellooo! :3";

pub const UNKNOWN_COMMAND: &str = "Unknown command.";
pub const NO_SAVED_PAGES: &str = "You have no saved pages.";
pub const SAVED: &str = "Saved!";
pub const ALREADY_EXISTS: &str = "You already have this page on your list.";
pub const DELETED: &str = "Page was deleted.";
pub const NOT_ON_LIST: &str = "This page is not on your list.";
pub const USAGE_DELETE: &str = "Usage: /del or /del <number> or /del <url>";
pub const USAGE_SAVE: &str = "Usage: /save <url>";
pub const USAGE_DAILY: &str = "Usage: /daily on or /daily off";
pub const USAGE_TZ: &str = "Usage: /tz <Area/City>, e.g. /tz Europe/Berlin";
pub const DAILY_ON: &str = "Daily page is on. I'll send you one saved link a day.";
pub const DAILY_OFF: &str = "Daily page is off.";

pub fn hello() -> String {
    format!("{GREETING}\n\n{HELP}")
}

pub fn only_n_items(n: usize) -> String {
    format!("You have only {n} items in the list. Send /del to see them.")
}

pub fn list_header(shown: usize, total: usize) -> String {
    if total > shown {
        format!("Your saved pages ({shown} of {total}):\n\n")
    } else {
        String::from("Your saved pages:\n\n")
    }
}

pub fn timezone_set(tz: &str) -> String {
    format!("Timezone set to {tz}.")
}

pub fn daily_status(enabled: bool, timezone: &str, hour: u32, minute: u32) -> String {
    if enabled {
        format!("Daily page is on. Next one around {hour:02}:{minute:02} ({timezone}).")
    } else {
        format!("Daily page is off. Timezone: {timezone}.")
    }
}
