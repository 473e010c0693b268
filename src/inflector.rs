//! English word inflection for table and type names.
//!
//! Table names are plural snake case (`blog_posts`), entity type names are
//! singular camel case (`BlogPost`). The rules here cover regular English
//! suffixes plus a short list of irregular and uncountable words.

/// Word inflection used to derive table, type and key names.
pub trait Inflector: Send + Sync {
    fn pluralize(&self, word: &str) -> String;

    fn singularize(&self, word: &str) -> String;

    /// `blog_post` → `BlogPost`
    fn camelize(&self, word: &str) -> String {
        word.split('/')
            .map(|segment| {
                segment
                    .split('_')
                    .filter(|p| !p.is_empty())
                    .map(capitalize)
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("::")
    }

    /// `BlogPost` → `blog_post`
    fn underscore(&self, word: &str) -> String {
        let word = word.replace("::", "/");
        let chars: Vec<char> = word.chars().collect();
        let mut out = String::with_capacity(word.len() + 4);

        for (i, &c) in chars.iter().enumerate() {
            if c.is_uppercase() && i > 0 {
                let prev = chars[i - 1];
                let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
                if prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase() && next_is_lower)
                {
                    out.push('_');
                }
            }
            if c == '-' {
                out.push('_');
            } else {
                out.extend(c.to_lowercase());
            }
        }
        out
    }

    /// Type name for a table name: `blog_posts` → `BlogPost`.
    ///
    /// A schema prefix (`blog.posts`) is ignored.
    fn classify(&self, table_name: &str) -> String {
        let name = table_name.rsplit('.').next().unwrap_or(table_name);
        self.camelize(&self.singularize(name))
    }

    /// Default table name for a type name: `BlogPost` → `blog_posts`.
    fn tableize(&self, type_name: &str) -> String {
        self.pluralize(&self.underscore(type_name))
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "jeans",
    "news",
    "police",
];

/// (singular, plural)
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("man", "men"),
    ("woman", "women"),
    ("child", "children"),
    ("sex", "sexes"),
    ("move", "moves"),
    ("ox", "oxen"),
    ("mouse", "mice"),
    ("louse", "lice"),
    ("quiz", "quizzes"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("goose", "geese"),
];

/// English inflection rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnglishInflector;

impl EnglishInflector {
    pub fn new() -> Self {
        Self
    }
}

/// Split `word` into everything up to its last snake case segment and the
/// segment itself, lowercased for rule matching.
fn split_last_word(word: &str) -> (&str, String) {
    match word.rfind('_') {
        Some(pos) => (&word[..=pos], word[pos + 1..].to_lowercase()),
        None => ("", word.to_lowercase()),
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Whether the last char of `stem` is a consonant, treating `qu` as one.
fn ends_in_consonant(stem: &str) -> bool {
    if stem.ends_with("qu") {
        return true;
    }
    stem.chars().last().is_some_and(|c| !is_vowel(c) && c != 'y')
}

fn pluralize_word(word: &str) -> String {
    for (root, ending) in [("matr", "ix"), ("vert", "ex"), ("ind", "ex")] {
        if let Some(stem) = word.strip_suffix(ending)
            && stem.ends_with(root)
        {
            return format!("{stem}ices");
        }
    }
    if word.ends_with("sis") {
        return format!("{}ses", &word[..word.len() - 3]);
    }
    for suffix in ["x", "ch", "ss", "sh"] {
        if word.ends_with(suffix) {
            return format!("{word}es");
        }
    }
    if let Some(stem) = word.strip_suffix('y')
        && ends_in_consonant(stem)
    {
        return format!("{stem}ies");
    }
    if word.ends_with("hive") {
        return format!("{word}s");
    }
    if let Some(stem) = word.strip_suffix("fe")
        && !stem.ends_with('f')
    {
        return format!("{stem}ves");
    }
    if let Some(stem) = word.strip_suffix('f')
        && (stem.ends_with('l') || stem.ends_with('r'))
    {
        return format!("{stem}ves");
    }
    if let Some(stem) = word.strip_suffix("um")
        && (stem.ends_with('t') || stem.ends_with('i'))
    {
        return format!("{stem}a");
    }
    for suffix in ["buffalo", "tomato", "potato", "hero"] {
        if word.ends_with(suffix) {
            return format!("{word}es");
        }
    }
    if word.ends_with("bus") || word.ends_with("alias") || word.ends_with("status") {
        return format!("{word}es");
    }
    if let Some(stem) = word
        .strip_suffix("us")
        .filter(|s| s.ends_with("octop") || s.ends_with("vir"))
    {
        return format!("{stem}i");
    }
    if let Some(stem) = word
        .strip_suffix("is")
        .filter(|s| s.ends_with("ax") || s.ends_with("test"))
    {
        return format!("{stem}es");
    }
    format!("{word}s")
}

fn singularize_word(word: &str) -> String {
    for suffix in ["alias", "status", "bus"] {
        if word.ends_with(suffix) {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix("es")
            && stem.ends_with(suffix)
        {
            return stem.to_string();
        }
    }
    if let Some(stem) = word
        .strip_suffix('i')
        .filter(|s| s.ends_with("octop") || s.ends_with("vir"))
    {
        return format!("{stem}us");
    }
    if let Some(stem) = word.strip_suffix("ices") {
        for (root, ending) in [("matr", "ix"), ("vert", "ex"), ("ind", "ex")] {
            if stem.ends_with(root) {
                return format!("{stem}{ending}");
            }
        }
    }
    if let Some(stem) = word
        .strip_suffix("es")
        .filter(|s| s.ends_with("cris") || s.ends_with("ax") || s.ends_with("test"))
    {
        return format!("{stem}is");
    }
    if word.ends_with("sis") {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ses")
        && ["analy", "ba", "diagno", "parenthe", "progno", "synop", "the"]
            .iter()
            .any(|root| stem.ends_with(root))
    {
        return format!("{stem}sis");
    }
    if word.ends_with("shoes") {
        return word[..word.len() - 1].to_string();
    }
    for suffix in ["buffaloes", "tomatoes", "potatoes", "heroes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    for suffix in ["xes", "ches", "sses", "shes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("movies") {
        return word[..word.len() - 1].to_string();
    }
    if let Some(stem) = word.strip_suffix("ies")
        && ends_in_consonant(stem)
    {
        return format!("{stem}y");
    }
    if word.ends_with("hives") || word.ends_with("tives") {
        return word[..word.len() - 1].to_string();
    }
    if let Some(stem) = word.strip_suffix("ves") {
        if stem.ends_with('l') || stem.ends_with('r') {
            return format!("{stem}f");
        }
        if !stem.ends_with('f') {
            return format!("{stem}fe");
        }
    }
    if let Some(stem) = word
        .strip_suffix('a')
        .filter(|s| s.ends_with('t') || s.ends_with('i'))
    {
        return format!("{stem}um");
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

impl Inflector for EnglishInflector {
    fn pluralize(&self, word: &str) -> String {
        let (prefix, last) = split_last_word(word);
        if last.is_empty() || UNCOUNTABLE.contains(&last.as_str()) {
            return word.to_string();
        }
        if let Some((_, plural)) = IRREGULAR.iter().find(|(s, p)| *s == last || *p == last) {
            return format!("{prefix}{plural}");
        }
        // Already plural words are left alone
        let singular = singularize_word(&last);
        if singular != last && pluralize_word(&singular) == last {
            return word.to_string();
        }
        format!("{prefix}{}", pluralize_word(&last))
    }

    fn singularize(&self, word: &str) -> String {
        let (prefix, last) = split_last_word(word);
        if last.is_empty() || UNCOUNTABLE.contains(&last.as_str()) {
            return word.to_string();
        }
        if let Some((singular, _)) = IRREGULAR.iter().find(|(s, p)| *s == last || *p == last) {
            return format!("{prefix}{singular}");
        }
        format!("{prefix}{}", singularize_word(&last))
    }
}
