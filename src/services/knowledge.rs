//! 知识库：内存 TF-IDF 检索
//!
//! 内置德语旅行语料（城市信息、景点、旅行建议、通用建议）；search 按余弦相似度返回 top_k（低于阈值丢弃），
//! answer 取最相关的两条，若指定城市则优先该城市的条目。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::core::ServiceError;
use crate::services::{KnowledgeHit, KnowledgeRetriever};

/// 低于此相似度的命中被丢弃
pub const DEFAULT_MIN_SCORE: f32 = 0.1;

/// answer() 取用的命中条数
const ANSWER_HITS: usize = 2;

const NO_KNOWLEDGE: &str =
    "Entschuldigung, ich habe keine relevanten Informationen zu Ihrer Frage gefunden.";

/// 常见德语虚词，不参与打分
const STOP_WORDS: &[&str] = &[
    "der", "die", "das", "und", "in", "ist", "im", "am", "an", "den", "dem", "des", "ein", "eine",
    "einer", "für", "mit", "von", "zu", "es", "sie", "auf", "bei", "wie", "was", "ich", "kann",
    "sollte", "sind", "oder", "als", "seine", "seinen", "sich",
];

/// 知识条目
#[derive(Debug, Clone)]
pub struct KnowledgeDoc {
    pub content: String,
    /// 小写城市名；通用条目为 "general"
    pub city: String,
    pub category: String,
}

impl KnowledgeDoc {
    pub fn new(city: &str, category: &str, content: &str) -> Self {
        Self {
            content: content.to_string(),
            city: city.to_lowercase(),
            category: category.to_string(),
        }
    }
}

/// 小写、按非字母数字切分、去掉单字符与虚词
pub fn tokenize(text: &str) -> Vec<String> {
    let stop: HashSet<&str> = STOP_WORDS.iter().copied().collect();
    text.split(|c: char| !c.is_alphanumeric())
        .map(|s| s.to_lowercase())
        .filter(|s| s.chars().count() > 1 && !stop.contains(s.as_str()))
        .collect()
}

/// 稀疏 TF-IDF 向量（已归一化）
type SparseVector = HashMap<String, f32>;

/// 内存 TF-IDF 知识库
pub struct LexicalKnowledgeBase {
    docs: Vec<KnowledgeDoc>,
    idf: HashMap<String, f32>,
    vectors: Vec<SparseVector>,
    min_score: f32,
}

impl LexicalKnowledgeBase {
    pub fn new(docs: Vec<KnowledgeDoc>) -> Self {
        let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(&d.content)).collect();
        let n = docs.len() as f32;

        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            for term in tokens.iter().collect::<HashSet<_>>() {
                *df.entry(term.clone()).or_default() += 1;
            }
        }
        // 平滑 idf：ln((1 + n) / (1 + df)) + 1
        let idf: HashMap<String, f32> = df
            .into_iter()
            .map(|(term, count)| (term, ((1.0 + n) / (1.0 + count as f32)).ln() + 1.0))
            .collect();

        let vectors = tokenized.iter().map(|t| vectorize(t, &idf)).collect();
        Self {
            docs,
            idf,
            vectors,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// 内置语料
    pub fn with_default_corpus() -> Self {
        Self::new(default_corpus())
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// 同步检索：按得分降序，得分相同保持语料顺序
    pub fn rank(&self, query: &str, top_k: usize) -> Vec<KnowledgeHit> {
        let query_vec = vectorize(&tokenize(query), &self.idf);
        if query_vec.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, cosine(&query_vec, v)))
            .filter(|(_, s)| *s > self.min_score)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let doc = &self.docs[i];
                KnowledgeHit {
                    content: doc.content.clone(),
                    city: doc.city.clone(),
                    category: doc.category.clone(),
                    score,
                }
            })
            .collect()
    }
}

fn vectorize(tokens: &[String], idf: &HashMap<String, f32>) -> SparseVector {
    let mut tf: SparseVector = HashMap::new();
    for t in tokens {
        if idf.contains_key(t) {
            *tf.entry(t.clone()).or_default() += 1.0;
        }
    }
    for (term, weight) in tf.iter_mut() {
        *weight *= idf[term];
    }
    let norm = tf.values().map(|w| w * w).sum::<f32>().sqrt();
    if norm > 0.0 {
        tf.values_mut().for_each(|w| *w /= norm);
    }
    tf
}

fn cosine(a: &SparseVector, b: &SparseVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

#[async_trait]
impl KnowledgeRetriever for LexicalKnowledgeBase {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>, ServiceError> {
        Ok(self.rank(query, top_k))
    }

    async fn answer(&self, question: &str, city: Option<&str>) -> Result<String, ServiceError> {
        let mut hits = self.rank(question, ANSWER_HITS);
        if hits.is_empty() {
            return Ok(NO_KNOWLEDGE.to_string());
        }
        if let Some(city) = city {
            let city = city.to_lowercase();
            let local: Vec<KnowledgeHit> = hits.iter().filter(|h| h.city == city).cloned().collect();
            if !local.is_empty() {
                hits = local;
            }
        }
        Ok(hits
            .iter()
            .map(|h| h.content.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// 内置德语旅行语料
pub fn default_corpus() -> Vec<KnowledgeDoc> {
    [
        ("paris", "city_info", "Paris ist die Hauptstadt Frankreichs und bekannt für den Eiffelturm, den Louvre und die Champs-Élysées. Die beste Reisezeit ist von April bis Oktober."),
        ("paris", "travel_tips", "Für Reisen nach Paris empfehlen sich mindestens 3-4 Tage. Besuchen Sie den Eiffelturm am besten früh morgens oder abends."),
        ("paris", "attractions", "Der Louvre in Paris ist das größte Kunstmuseum der Welt. Kaufen Sie Tickets online und besuchen Sie es am besten dienstags oder donnerstags."),
        ("paris", "attractions", "Die Champs-Élysées in Paris sind eine der berühmtesten Straßen der Welt. Perfekt für Shopping und Menschenbeobachtung."),
        ("london", "city_info", "London ist die Hauptstadt Englands mit Sehenswürdigkeiten wie Big Ben, Tower Bridge und Buckingham Palace. Das Wetter ist oft regnerisch."),
        ("london", "travel_tips", "In London sollten Sie das London Eye, Westminster Abbey und den Tower of London besuchen. Nutzen Sie die U-Bahn für Transport."),
        ("london", "attractions", "Der Big Ben ist das Wahrzeichen Londons. Die beste Zeit für Fotos ist bei Sonnenuntergang."),
        ("rom", "city_info", "Rom ist die Hauptstadt Italiens mit dem Kolosseum, dem Vatikan und dem Trevi-Brunnen. Die beste Reisezeit ist im Frühling oder Herbst."),
        ("rom", "travel_tips", "Rom ist am besten zu Fuß zu erkunden. Besuchen Sie das Kolosseum mit Führung und reservieren Sie für den Vatikan im Voraus."),
        ("rom", "attractions", "Der Vatikan in Rom ist der kleinste Staat der Welt. Besuchen Sie die Sixtinische Kapelle und den Petersdom."),
        ("berlin", "city_info", "Berlin ist die Hauptstadt Deutschlands und bekannt für das Brandenburger Tor, die Berliner Mauer und die Museumsinsel."),
        ("berlin", "attractions", "Das Brandenburger Tor ist das Wahrzeichen Berlins. Besuchen Sie es am besten bei Sonnenuntergang."),
        ("berlin", "attractions", "Die Museumsinsel in Berlin ist UNESCO-Weltkulturerbe. Besuchen Sie das Pergamonmuseum und das Neue Museum."),
        ("amsterdam", "city_info", "Amsterdam ist die Hauptstadt der Niederlande und bekannt für seine Grachten, das Van Gogh Museum und das Anne Frank Haus."),
        ("amsterdam", "attractions", "Die Grachten von Amsterdam sind UNESCO-Weltkulturerbe. Machen Sie eine Bootstour durch die historische Innenstadt."),
        ("wien", "city_info", "Wien ist die Hauptstadt Österreichs und bekannt für seine kaiserliche Geschichte, klassische Musik und prächtige Architektur."),
        ("wien", "attractions", "Der Stephansdom ist das Wahrzeichen Wiens. Besteigen Sie den Südturm für einen atemberaubenden Blick über die Stadt."),
        ("wien", "attractions", "Das Schloss Schönbrunn in Wien ist die ehemalige Sommerresidenz der Habsburger. Besuchen Sie die prächtigen Gärten."),
        ("wien", "travel_tips", "Genießen Sie in Wien die Kaffeehauskultur in Cafés wie dem Café Central oder dem Café Sacher."),
        ("barcelona", "city_info", "Barcelona ist die Hauptstadt Kataloniens und bekannt für die Sagrada Familia, den Park Güell und die Ramblas."),
        ("barcelona", "attractions", "Die Sagrada Familia in Barcelona ist Gaudís Meisterwerk. Kaufen Sie Tickets online und besuchen Sie sie am besten morgens."),
        ("kopenhagen", "city_info", "Kopenhagen ist die Hauptstadt Dänemarks und bekannt für die Kleine Meerjungfrau, Nyhavn und Tivoli."),
        ("kopenhagen", "attractions", "Nyhavn ist der malerische Hafen Kopenhagens mit bunten Häusern und Restaurants."),
        ("general", "general_tips", "Buchen Sie Flüge und Hotels mindestens 3 Monate im Voraus für die günstigsten Preise."),
        ("general", "general_tips", "Nutzen Sie öffentliche Verkehrsmittel in europäischen Städten - sie sind oft günstiger und schneller als Taxis."),
        ("general", "general_tips", "Besuchen Sie beliebte Sehenswürdigkeiten früh morgens oder spät abends, um Menschenmassen zu vermeiden."),
        ("general", "general_tips", "Laden Sie Offline-Karten herunter und lernen Sie ein paar grundlegende Sätze in der Landessprache."),
    ]
    .into_iter()
    .map(|(city, category, content)| KnowledgeDoc::new(city, category, content))
    .collect()
}
