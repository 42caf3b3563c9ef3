//! 地名词典：在消息中按整词（不区分大小写）查找已知地点，列表中先匹配者优先
//!
//! 整词匹配避免把 "Klima" 认成 Lima、把 "Strom" 认成 Rom。

use regex::Regex;

/// 已知地点（小写；多词地名排在其子串之前）
const KNOWN_PLACES: &[&str] = &[
    "new york", "los angeles", "rio de janeiro", "sao paulo", "buenos aires",
    "paris", "london", "rom", "madrid", "barcelona", "amsterdam", "berlin", "wien", "prag",
    "budapest", "stockholm", "kopenhagen", "oslo", "helsinki", "warschau", "athen", "istanbul",
    "dubai", "tokio", "singapur", "bangkok", "sydney", "melbourne", "chicago", "miami",
    "toronto", "montreal", "vancouver", "mexiko", "lima", "bogota", "montevideo", "quito",
    "münchen", "hamburg", "köln", "frankfurt", "dresden", "zürich", "lissabon", "venedig",
    "florenz", "mailand", "brüssel", "dublin", "edinburgh",
];

/// 地名词典
#[derive(Debug, Clone)]
pub struct Gazetteer {
    /// (小写地名, 整词模式)
    places: Vec<(String, Regex)>,
}

impl Gazetteer {
    pub fn new(places: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            places: places
                .into_iter()
                .filter_map(|p| {
                    let place = p.into().trim().to_lowercase();
                    let pattern = format!(r"(?i)\b{}\b", regex::escape(&place));
                    Regex::new(&pattern).ok().map(|re| (place, re))
                })
                .collect(),
        }
    }

    /// 返回消息中第一个已知地点（按列表顺序），首字母大写
    pub fn find(&self, message: &str) -> Option<String> {
        self.places
            .iter()
            .find(|(_, pattern)| pattern.is_match(message))
            .map(|(place, _)| title_case(place))
    }
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new(KNOWN_PLACES.iter().copied())
    }
}

/// 每个词（空格或连字符分隔）首字母大写，其余小写
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut start_of_word = true;
    for c in text.trim().chars() {
        if c == ' ' || c == '-' {
            out.push(c);
            start_of_word = true;
        } else if start_of_word {
            out.extend(c.to_uppercase());
            start_of_word = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_is_case_insensitive() {
        let g = Gazetteer::default();
        assert_eq!(g.find("HOTELS IN BERLIN"), Some("Berlin".to_string()));
        assert_eq!(g.find("Wetter in münchen?"), Some("München".to_string()));
    }

    #[test]
    fn test_find_first_listed_place_wins() {
        let g = Gazetteer::new(["wien", "paris"]);
        assert_eq!(g.find("Paris oder Wien?"), Some("Wien".to_string()));
    }

    #[test]
    fn test_multi_word_place() {
        let g = Gazetteer::default();
        assert_eq!(g.find("Flüge nach new york"), Some("New York".to_string()));
    }

    #[test]
    fn test_place_inside_another_word_is_ignored() {
        let g = Gazetteer::default();
        assert_eq!(g.find("Wie ist das Klima in Dresden?"), Some("Dresden".to_string()));
        assert_eq!(g.find("Wie ist das Klima dort?"), None);
        assert_eq!(g.find("Gibt es Strom im Zimmer?"), None);
        assert_eq!(g.find("Ein Hotel in Rom, bitte"), Some("Rom".to_string()));
    }

    #[test]
    fn test_no_place() {
        assert_eq!(Gazetteer::default().find("Wie geht es dir?"), None);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("rio de janeiro"), "Rio De Janeiro");
        assert_eq!(title_case("  BADEN-baden "), "Baden-Baden");
    }
}
