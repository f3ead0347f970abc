mod reminders;

pub use reminders::ReminderTask;
