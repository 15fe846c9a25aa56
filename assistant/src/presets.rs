/// Canned prompts offered next to free text input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    SupportAgent,
    ChatWithGolpu,
    GeneralFaq,
    OpenAccount,
    LoanInfo,
    GolpuChat,
}

impl Preset {
    pub const ALL: [Preset; 6] = [
        Preset::SupportAgent,
        Preset::ChatWithGolpu,
        Preset::GeneralFaq,
        Preset::OpenAccount,
        Preset::LoanInfo,
        Preset::GolpuChat,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Preset::SupportAgent => "Support Agent",
            Preset::ChatWithGolpu => "Chat with Golpu",
            Preset::GeneralFaq => "General FAQ",
            Preset::OpenAccount => "Open Account",
            Preset::LoanInfo => "Loan Info",
            Preset::GolpuChat => "Golpu Chat",
        }
    }

    /// Name typed after `/preset`.
    pub fn command(self) -> &'static str {
        match self {
            Preset::SupportAgent => "support",
            Preset::ChatWithGolpu => "golpu",
            Preset::GeneralFaq => "faq",
            Preset::OpenAccount => "account",
            Preset::LoanInfo => "loan",
            Preset::GolpuChat => "joke",
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Preset::SupportAgent => {
                "হ্যালো, আমি এখন ব্যাংকিং সেবা সম্পর্কে জানতে চাই। প্রফেশনাল সাপোর্ট দিন।"
            }
            Preset::ChatWithGolpu => {
                "হ্যালো! আমি এখন আপনার সাথে গল্পু (Golpu) হিসেবে আড্ডা দিতে চাই। আমাকে আপনার বন্ধু ভাবুন।"
            }
            Preset::GeneralFaq => {
                "Hawlader Bank-এর সাধারণ কিছু প্রশ্ন (General FAQ) ও তার উত্তর আমাকে জানান।"
            }
            Preset::OpenAccount => "How do I open an account?",
            Preset::LoanInfo => "কিভাবে লোন পাবো?",
            Preset::GolpuChat => "গল্পু, আমাকে একটা মজার জোকস বলো!",
        }
    }

    pub fn from_command(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.command().eq_ignore_ascii_case(name))
    }
}
