//! Origin locales and the failure message catalog.

use crate::failure::{Failure, FailureKind};
use crate::surface::SurfaceKind;
use serde::{Deserialize, Serialize};

/// Language the origin expects failure messages in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Hebrew.
    #[default]
    He,
    /// English.
    En,
}

impl Locale {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::He => "he",
            Self::En => "en",
        }
    }

    /// Render `failure` as a user-facing message.
    #[must_use]
    pub fn describe(self, failure: &Failure) -> String {
        let (name, host) = failure
            .surface
            .map(|s| (s.display_name(), s.host()))
            .unwrap_or(("AI", "the chat site"));
        match self {
            Self::He => hebrew(failure.kind, name, host),
            Self::En => english(failure.kind, name, host),
        }
    }

    /// Shown when a transcript run is started with no text.
    #[must_use]
    pub fn empty_input(self) -> &'static str {
        match self {
            Self::He => "אנא הזן טקסט לעיבוד.",
            Self::En => "Please enter text to process.",
        }
    }

    /// Short bridge status line for the app's indicator.
    #[must_use]
    pub fn bridge_status(self, connected: bool) -> &'static str {
        match (self, connected) {
            (Self::He, true) => "גשר פעיל",
            (Self::He, false) => "תוסף לא מחובר",
            (Self::En, true) => "Bridge active",
            (Self::En, false) => "Extension not connected",
        }
    }
}

fn hebrew(kind: FailureKind, name: &str, host: &str) -> String {
    const API_HINT: &str = "פתרון מומלץ: עבור למצב API ישיר בהגדרות הספק.";
    match kind {
        FailureKind::TargetUnavailable => "נא לפתוח את Claude.ai או Gemini בטאב נפרד".to_owned(),
        FailureKind::InputNotFound => format!(
            "שגיאת ממשק: תיבת הטקסט של {name} לא נמצאה.\n\
             ייתכן שממשק {host} עודכן ושינה את מבנה ה-DOM.\n{API_HINT}"
        ),
        FailureKind::InsertionFailed => format!(
            "שגיאת ממשק: הכנסת הטקסט ל-{name} נכשלה (הדבקה + הכנסה ישירה שתיהן כשלו).\n{API_HINT}"
        ),
        FailureKind::SubmitNotFound => format!(
            "שגיאת ממשק: כפתור השליחה של {name} לא נמצא או מושבת.\n\
             ייתכן שהטקסט לא נקלט כראוי, או שממשק {host} שונה.\n{API_HINT}"
        ),
        FailureKind::EmptyOrTooShortResponse => format!(
            "לא נמצאה תגובה של {name} (או שהתגובה קצרה מדי).\n\
             ודא שאתה מחובר ל-{host} ושהשיחה פעילה."
        ),
        FailureKind::Timeout => format!(
            "תם הזמן להמתנה לתגובה של {name}.\nנסה לשלוח שוב את המקטע."
        ),
        FailureKind::SurfaceLost => format!(
            "הקשר עם הטאב של {name} נותק במהלך העיבוד.\nודא שהטאב פתוח ונסה שוב."
        ),
        FailureKind::Busy => "בקשה קודמת עדיין בעיבוד. המתן לסיומה ונסה שוב.".to_owned(),
    }
}

fn english(kind: FailureKind, name: &str, host: &str) -> String {
    const API_HINT: &str = "Suggested fix: switch to direct API mode in the provider settings.";
    match kind {
        FailureKind::TargetUnavailable => {
            "Please open Claude.ai or Gemini in a separate tab".to_owned()
        }
        FailureKind::InputNotFound => format!(
            "Interface error: the {name} text box was not found.\n\
             The {host} interface may have changed its DOM structure.\n{API_HINT}"
        ),
        FailureKind::InsertionFailed => format!(
            "Interface error: inserting text into {name} failed (paste and direct insertion both failed).\n{API_HINT}"
        ),
        FailureKind::SubmitNotFound => format!(
            "Interface error: the {name} send button was not found or is disabled.\n\
             The text may not have been accepted, or the {host} interface changed.\n{API_HINT}"
        ),
        FailureKind::EmptyOrTooShortResponse => format!(
            "No response from {name} was found (or it was too short).\n\
             Make sure you are signed in to {host} and the conversation is active."
        ),
        FailureKind::Timeout => format!(
            "Timed out waiting for a response from {name}.\nTry sending the chunk again."
        ),
        FailureKind::SurfaceLost => format!(
            "The connection to the {name} tab was lost mid-request.\n\
             Make sure the tab is open and try again."
        ),
        FailureKind::Busy => {
            "A previous request is still being processed. Wait for it to finish and try again."
                .to_owned()
        }
    }
}
