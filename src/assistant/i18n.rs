//! Russian / Uzbek content.
//!
//! Static strings are looked up through [`Text`]; strings that interpolate
//! configuration (brand, channel, phone) have their own helpers. Every
//! user-facing string the assistant sends comes from here.

use crate::assistant::message::{Button, Keyboard};

/// A supported conversation language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Ru,
    Uz,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::Ru, Language::Uz];

    /// Code stored in the database and shown to the operator.
    pub fn code(self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Uz => "uz",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ru" => Some(Language::Ru),
            "uz" => Some(Language::Uz),
            _ => None,
        }
    }

    /// Guess from the platform locale. Uzbek locales map to Uzbek,
    /// everything else (including a missing hint) to Russian.
    pub fn detect(locale: Option<&str>) -> Self {
        match locale {
            Some(code) if code.trim().to_lowercase().starts_with("uz") => Language::Uz,
            _ => Language::Ru,
        }
    }

    /// Label on the language picker button.
    pub fn picker_label(self) -> &'static str {
        match self {
            Language::Ru => "🇷🇺 Русский",
            Language::Uz => "🇺🇿 O'zbekcha",
        }
    }
}

/// Static texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Text {
    ChooseLanguage,
    LanguageSet,
    MenuTitle,
    Cancel,
    Back,
    Cancelled,
    Terms,
    Why,
    MinOrder,
    MinOrderCta,
    AskRole,
    AskProduct,
    AskQuantity,
    AskCity,
    AskPhone,
    SendContact,
    InvalidPhone,
}

impl Text {
    pub fn get(self, lang: Language) -> &'static str {
        use Language::{Ru, Uz};
        match (self, lang) {
            (Text::ChooseLanguage, Ru) => "Выберите язык / Tilni tanlang:",
            (Text::ChooseLanguage, Uz) => "Tilni tanlang / Выберите язык:",
            (Text::LanguageSet, Ru) => "✅ Язык установлен: Русский",
            (Text::LanguageSet, Uz) => "✅ Til o'rnatildi: O'zbekcha",
            (Text::MenuTitle, Ru) => "Главное меню 👇",
            (Text::MenuTitle, Uz) => "Asosiy menyu 👇",
            (Text::Cancel, Ru) => "❌ Отмена",
            (Text::Cancel, Uz) => "❌ Bekor qilish",
            (Text::Back, Ru) => "⬅️ Назад",
            (Text::Back, Uz) => "⬅️ Orqaga",
            (Text::Cancelled, Ru) => "❌ Отменено. Возвращаю в меню.",
            (Text::Cancelled, Uz) => "❌ Bekor qilindi. Menyuga qaytyapman.",
            (Text::Terms, Ru) => {
                "🧾 <b>Условия опта</b>:\n• Работаем по предзаказу\n• Доставка по Узбекистану\n• Индивидуальные условия для партнёров"
            }
            (Text::Terms, Uz) => {
                "🧾 <b>Ulgurji shartlar</b>:\n• Oldindan buyurtma\n• O'zbekiston bo'ylab yetkazib berish\n• Hamkorlar uchun individual shartlar"
            }
            (Text::Why, Ru) => {
                "⭐ <b>Почему выгодно работать с нами</b>:\n• Национальный бренд\n• Стабильные поставки\n• Высокая маржа\n• Востребованные модели"
            }
            (Text::Why, Uz) => {
                "⭐ <b>Nega biz bilan foydali</b>:\n• Milliy brend\n• Barqaror yetkazib berish\n• Yaxshi marja\n• Talab yuqori modellar"
            }
            (Text::MinOrder, Ru) => {
                "📦 Минимальный заказ уточняется у менеджера.\nХотите оформить заявку сейчас?"
            }
            (Text::MinOrder, Uz) => {
                "📦 Minimal buyurtmani menejer aniqlab beradi.\nHozir ariza qoldirasizmi?"
            }
            (Text::MinOrderCta, Ru) => "✅ Оставить заявку",
            (Text::MinOrderCta, Uz) => "✅ Ariza qoldirish",
            (Text::AskRole, Ru) => "Кто вы?",
            (Text::AskRole, Uz) => "Siz kimsiz?",
            (Text::AskProduct, Ru) => "Что хотите заказать?\nЕсли нет в списке — напишите текстом.",
            (Text::AskProduct, Uz) => {
                "Nima buyurtma qilmoqchisiz?\nRo'yxatda bo'lmasa — matn bilan yozing."
            }
            (Text::AskQuantity, Ru) => "Сколько штук?",
            (Text::AskQuantity, Uz) => "Nechta dona?",
            (Text::AskCity, Ru) => "Город доставки?",
            (Text::AskCity, Uz) => "Yetkazib berish shahri?",
            (Text::AskPhone, Ru) => "Телефон: (лучше нажмите кнопку «📲 Отправить контакт»)",
            (Text::AskPhone, Uz) => "Telefon: (yaxshisi «📲 Kontakt yuborish» tugmasini bosing)",
            (Text::SendContact, Ru) => "📲 Отправить контакт",
            (Text::SendContact, Uz) => "📲 Kontakt yuborish",
            (Text::InvalidPhone, Ru) => {
                "Пожалуйста, отправьте контакт кнопкой или напишите номер текстом (например +998901234567)."
            }
            (Text::InvalidPhone, Uz) => {
                "Iltimos, kontaktni tugma orqali yuboring yoki raqamni matn bilan yozing (masalan +998901234567)."
            }
        }
    }
}

/// Entries of the main menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Catalog,
    Terms,
    Why,
    MinOrder,
    LeaveRequest,
    Manager,
    Channel,
    Language,
}

impl MenuItem {
    pub const ALL: [MenuItem; 8] = [
        MenuItem::Catalog,
        MenuItem::Terms,
        MenuItem::Why,
        MenuItem::MinOrder,
        MenuItem::LeaveRequest,
        MenuItem::Manager,
        MenuItem::Channel,
        MenuItem::Language,
    ];

    pub fn label(self, lang: Language) -> &'static str {
        use Language::{Ru, Uz};
        match (self, lang) {
            (MenuItem::Catalog, Ru) => "📦 Каталог",
            (MenuItem::Catalog, Uz) => "📦 Katalog",
            (MenuItem::Terms, Ru) => "🧾 Условия",
            (MenuItem::Terms, Uz) => "🧾 Shartlar",
            (MenuItem::Why, Ru) => "⭐ Почему мы",
            (MenuItem::Why, Uz) => "⭐ Nega biz",
            (MenuItem::MinOrder, Ru) => "📦 Минимальный заказ",
            (MenuItem::MinOrder, Uz) => "📦 Minimal buyurtma",
            (MenuItem::LeaveRequest, Ru) => "🤝 Оставить заявку",
            (MenuItem::LeaveRequest, Uz) => "🤝 Ariza qoldirish",
            (MenuItem::Manager, Ru) => "📞 Менеджер",
            (MenuItem::Manager, Uz) => "📞 Menejer",
            (MenuItem::Channel, Ru) => "📣 Канал",
            (MenuItem::Channel, Uz) => "📣 Kanal",
            (MenuItem::Language, Ru) => "🌐 Язык",
            (MenuItem::Language, Uz) => "🌐 Til",
        }
    }
}

/// Quick-option labels suggested at the role step.
pub fn role_options(lang: Language) -> [&'static str; 4] {
    match lang {
        Language::Ru => ["Бутик", "Магазин", "Маркетплейс", "Другое"],
        Language::Uz => ["Butik", "Do'kon", "Marketplace", "Boshqa"],
    }
}

/// Quick-option labels suggested at the product step.
pub fn product_options(lang: Language) -> [&'static str; 6] {
    match lang {
        Language::Ru => ["Худи", "Брюки", "Школьная форма", "Костюм", "Пижама", "Другое"],
        Language::Uz => ["Xudi", "Shim", "Maktab formasi", "Kostyum", "Pijoma", "Boshqa"],
    }
}

/// Quantity buckets; identical in both languages.
pub fn quantity_options() -> [&'static str; 4] {
    ["20–50", "50–100", "100–300", "300+"]
}

/// Business details interpolated into static replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub brand: String,
    /// Public channel name without `@`.
    pub channel: String,
    pub manager_phone: String,
}

impl Default for Content {
    fn default() -> Self {
        Self {
            brand: "ZARY & CO".to_string(),
            channel: "zaryco_official".to_string(),
            manager_phone: "+998771202255".to_string(),
        }
    }
}

impl Content {
    fn brand(&self) -> String {
        crate::assistant::message::escape_html(&self.brand)
    }

    fn channel_url(&self) -> String {
        format!("https://t.me/{}", self.channel)
    }

    pub fn welcome(&self, lang: Language) -> String {
        match lang {
            Language::Ru => format!(
                "🤝 <b>{} ОПТ</b>\nРаботаем с магазинами и маркетплейсами.\nПолучите каталог и условия 👇",
                self.brand()
            ),
            Language::Uz => format!(
                "🤝 <b>{} ULGURJI</b>\nDo'konlar va marketplace bilan ishlaymiz.\nKatalog va shartlarni oling 👇",
                self.brand()
            ),
        }
    }

    pub fn manager(&self, lang: Language) -> String {
        match lang {
            Language::Ru => format!("📞 Менеджер оптового отдела\nТелефон: <b>{}</b>", self.manager_phone),
            Language::Uz => format!("📞 Ulgurji bo'lim menejeri\nTelefon: <b>{}</b>", self.manager_phone),
        }
    }

    pub fn channel(&self, lang: Language) -> String {
        match lang {
            Language::Ru => format!("📣 Все коллекции в канале:\n{}", self.channel_url()),
            Language::Uz => format!("📣 Barcha kolleksiyalar kanalda:\n{}", self.channel_url()),
        }
    }

    pub fn catalog(&self, lang: Language) -> String {
        match lang {
            Language::Ru => format!("📸 Каталог публикуем в канале:\n{}", self.channel_url()),
            Language::Uz => format!("📸 Katalog kanalda:\n{}", self.channel_url()),
        }
    }

    pub fn thanks(&self, lang: Language) -> String {
        match lang {
            Language::Ru => format!(
                "✅ Спасибо! Вы выбрали {}.\nМенеджер свяжется с вами в ближайшие <b>15 минут</b> для уточнения деталей заказа.\n\n📣 Новинки и коллекции 👉 {}",
                self.brand(),
                self.channel_url()
            ),
            Language::Uz => format!(
                "✅ Rahmat! {} ni tanlaganingiz uchun.\nMenejer <b>15 daqiqa</b> ichida bog'lanib, buyurtma tafsilotlarini aniqlaydi.\n\n📣 Yangiliklar va kolleksiyalar 👉 {}",
                self.brand(),
                self.channel_url()
            ),
        }
    }
}

/// The persistent main menu.
pub fn main_menu(lang: Language) -> Keyboard {
    let b = |item: MenuItem| Button::Text(item.label(lang).to_string());
    Keyboard::rows(vec![
        vec![b(MenuItem::Catalog), b(MenuItem::Terms)],
        vec![b(MenuItem::Why), b(MenuItem::MinOrder)],
        vec![b(MenuItem::LeaveRequest)],
        vec![b(MenuItem::Manager), b(MenuItem::Channel)],
        vec![b(MenuItem::Language)],
    ])
}

/// Language picker; labels are the same regardless of the current language.
pub fn language_picker() -> Keyboard {
    Keyboard::rows(
        Language::ALL
            .iter()
            .map(|l| vec![Button::Text(l.picker_label().to_string())])
            .collect(),
    )
}

/// Keyboard under the minimum-order blurb.
pub fn min_order_keyboard(lang: Language) -> Keyboard {
    Keyboard::rows(vec![
        vec![Button::Text(Text::MinOrderCta.get(lang).to_string())],
        vec![Button::Text(Text::Cancel.get(lang).to_string())],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_language_from_locale() {
        assert_eq!(Language::detect(Some("uz-UZ")), Language::Uz);
        assert_eq!(Language::detect(Some("UZ")), Language::Uz);
        assert_eq!(Language::detect(Some("ru")), Language::Ru);
        assert_eq!(Language::detect(Some("en")), Language::Ru);
        assert_eq!(Language::detect(None), Language::Ru);
    }

    #[test]
    fn test_language_codes_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_code(lang.code()), Some(lang));
        }
        assert_eq!(Language::from_code("en"), None);
    }

    #[test]
    fn test_menu_labels_are_unique_across_languages() {
        let mut labels: Vec<&str> = MenuItem::ALL
            .iter()
            .flat_map(|item| Language::ALL.map(|l| item.label(l)))
            .collect();
        let total = labels.len();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), total);
    }

    #[test]
    fn test_brand_is_escaped() {
        let content = Content::default();
        assert!(content.welcome(Language::Ru).contains("ZARY &amp; CO"));
        assert!(content.thanks(Language::Uz).contains("https://t.me/zaryco_official"));
    }

    #[test]
    fn test_main_menu_contains_leave_request() {
        let menu = main_menu(Language::Uz);
        assert!(menu.labels().contains(&"🤝 Ariza qoldirish"));
        assert_eq!(menu.labels().len(), MenuItem::ALL.len());
    }
}
