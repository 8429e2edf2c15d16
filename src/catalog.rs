//! Frozen lookup tables: event context → category, event context → curriculum week.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::models::{Category, EventRow, WeekCatalogEntry};

pub const UNKNOWN_WEEK: &str = "Ismeretlen";
pub const NOT_WEEK_LINKED: &str = "Nem kapcsolódik héthez";

const HOMEWORK: &[&str] = &[
    "Fájl: 2. feladat",
    "Feladat: 1. beadandó - Határidő: 2025. március 23. (éjfél)",
    "Feladat: 2. beadandó - Határidő: 2025. április 13. (éjfél)",
    "Feladat: 3. beadandó - CSAK EGYÉNI TANREND ESETÉN - Határidő: 2025. május 18. (éjfél)",
    "Feladat: Csoportos feladat és prezentáció",
];

const EXAM: &[&str] = &[
    "Fájl: Adat-A",
    "Fájl: Adat-B",
    "Fájl: Adat-C",
    "Fájl: Adat-D",
    "Fájl: Adat-E",
    "Fájl: Adat-F",
    "Fájl: data-A",
    "Fájl: data-B",
    "Fájl: data-C",
    "Fájl: data-D",
    "Fájl: data-E",
    "Fájl: data-F",
    "Fájl: zh_A",
    "Fájl: zh_adatok",
    "Fájl: zh_B",
    "Fájl: zh-A",
    "Fájl: zh-B",
    "Feladat: zh (2025.06.12)",
    "Feladat: zh2-A",
    "Feladat: zh2-B",
    "Feladat: zh2-C",
    "Feladat: zh2-D",
    "Feladat: zh2-E",
    "Feladat: zh2-F",
    "Feladat: zh-A",
    "Feladat: zh-A (2025.06.04)",
    "Feladat: zh-B",
    "Feladat: zh-B (2025.06.04)",
    "Feladat: zh-C",
    "Feladat: zh-D",
    "Feladat: zh-E",
    "Feladat: zh-F",
    "Teszt: Elmélet1",
    "Teszt: Elmélet2",
    "Teszt: Elmélet2_1",
    "Teszt: Elmélet2_2",
    "Teszt: Elmélet2_3",
    "Teszt: Elmélet-2025.06.04",
    "Teszt: Elmélet-2025.06.12",
    "Teszt: Elmélet3",
];

const EXTRA: &[&str] = &[
    "Fájl: ChatGPT+saját dokumentum",
    "Fájl: EXTRA felatok - Pandas",
    "Fájl: EXTRA felatok - Pandas feladat adatai",
    "Fájl: MintaZH - gyakolat (adatok)",
    "Fájl: MintaZH - gyakorlat (feladatsor)",
    "Fájl: Modell értékelés (Racskó Péter)",
    "Teszt: MintaZH - elmélet",
    "URL: ChatGPT + saját dokumentum - Colab",
    "URL: Csoportosítás (Gyakorló feladat megoldása; Colab)",
    "URL: EXTRA - Gyakorló feladatok",
    "URL: Gyakorló feladat (zh-ra készülés) - Felügyelt tanulás",
    "URL: Gyakorló feladat (zh-ra készülés) - Felügyelt tanulás (megoldás)",
    "URL: Gyakorló feladatok (ZH-ra készülés) - nem felügyelt gépi tanítás",
    "URL: Gyakorló feladatok (ZH-ra készülés) - nem felügyelt gépi tanítás (megoldás)",
    "URL: How neural network works",
    "URL: Keras",
    "URL: Legjobb regressziós modell kiválasztása",
    "URL: Magyar nyelvű szövegek előfeldolgozása",
    "URL: NLP online könyv",
    "URL: Playground - Neurális hálózatok",
    "URL: Practical Deep Learning",
    "URL: Tensorflow",
    "URL: Train/test vágás",
    "URL: Túltanulás/alultanulás",
];

const IN_CLASS: &[&str] = &[
    "Fájl: Chatbot.txt",
    "Fájl: DeepSeek AGI",
    "Fájl: Előadás anyaga",
    "Fájl: Generatív AI alapjai - LSTM",
    "Fájl: Idősorok",
    "Fájl: Iris_Data.csv",
    "Fájl: Klasszifikáció",
    "Fájl: LLM",
    "Fájl: Modellek általánosítása, regresszió",
    "Fájl: Nem felügyelt gépi tanítás - Cluster",
    "Fájl: Nem felügyelt gépi tanítás - Dimenzió csökkentés",
    "Fájl: Neurális hálózatok",
    "Fájl: Pandas (ismétlés)",
    "Fájl: Természetes nyelvi feldolgozás alapjai",
    "Fájl: Természetes nyelvi feldolgozás II",
    "Mappa: Előadás anyagok",
    "Oldal: Előadások és gyakorlatok hanganyagai",
    "URL: A Kaggle egy site ahol számtalan gépi tanulási feladatot és hozzátartozó adatbázist érhetünk el.",
    "URL: Anaconda telepítés - Windows",
    "URL: Anaconda telepítése",
    "URL: Anaconda telepítése - MacOS",
    "URL: Bevezetés a Jupyter Notebook használatába",
    "URL: Chatbot - Colab",
    "URL: Csoportosítás  (Colab)",
    "URL: Dimenzió csökkentés (Colab)",
    "URL: Dimenzió csökkentés (Gyakoró feladat megoldása - Colab)",
    "URL: Hogyan működik a neurális hálózat",
    "URL: Iris_Data.csv (http://web.uni-corvinus.hu/~fszabina/data/Iris_Data.csv)",
    "URL: Klasszifikáció (Colab)",
    "URL: Klasszifikáció (Gyakorló feladatok megoldása; Colab)",
    "URL: Klasszifikáció adat Orange_Telecom_Churn_Data.csv",
    "URL: Magyar női utónév generátor- Colab",
    "URL: Modellek általánosítása; regresszió",
    "URL: Modellek általánosítása; regresszió (Gyakorló feladatok megoldás; Colab)",
    "URL: Neurális hálózatok - Colab",
    "URL: Neurális hálózatok - Colab (megoldás)",
    "URL: Név generátor- Colab",
    "URL: NLP - Colab",
    "URL: NLP - megoldás (Colab)",
    "URL: Pandas gakorlat megoldása (Colab)",
    "URL: Pandas gyakorlat (Colab)",
    "URL: Regresszió adat Ames_Housing_Sales.csv",
    "URL: Regresszió gyakorló feladat",
    "URL: Regresszió gyakorló feladat (megoldás)",
    "URL: Utasszám előrejelzés (LSTM)- Colab",
];

const ADMIN: &[&str] = &[
    "Jelenléti ív: G1 (Szerda 8:00-9:30; Fodor Szabina)",
    "Jelenléti ív: G2 (Szerda 9:50-11:20; Sarró-Oláh Bernadett",
    "Jelenléti ív: G3 (Szerda 9:50-11:20; Fodor Szabina)",
    "Jelenléti ív: G4 (Szerda 11:40-13:10; Sarro-Oláh Bernadett)",
    "Fájl: Tantágyi tájékoztató",
    "URL: Pontszámok - Összesített",
    "URL: Pontszámok - ZH1",
    "URL: Egyéni tanrendben hallgatók - vizsgaalkalma",
];

static CATEGORY_CATALOG: Lazy<HashMap<&'static str, Category>> = Lazy::new(|| {
    // Later tables win on duplicate keys.
    let tables: [(&[&str], Category); 5] = [
        (HOMEWORK, Category::Homework),
        (EXAM, Category::Exam),
        (EXTRA, Category::Extra),
        (IN_CLASS, Category::InClass),
        (ADMIN, Category::Admin),
    ];
    let mut map = HashMap::new();
    for (entries, category) in tables {
        for entry in entries {
            map.insert(*entry, category);
        }
    }
    map
});

/// Exact, case-sensitive lookup; unmapped contexts are `Other`.
pub fn categorize(context: &str) -> Category {
    CATEGORY_CATALOG
        .get(context)
        .copied()
        .unwrap_or(Category::Other)
}

pub fn assign_categories(rows: Vec<EventRow>) -> Vec<EventRow> {
    rows.into_iter()
        .map(|mut row| {
            row.category = categorize(&row.context);
            row
        })
        .collect()
}

const WEEK_PLAN: &[(&str, &str)] = &[
    ("Fájl: Chatbot.txt", "11. hét"),
    ("Fájl: DeepSeek AGI", "1. hét"),
    ("Fájl: Előadás anyaga", "1. hét"),
    ("Fájl: Generatív AI alapjai - LSTM", "12. hét"),
    ("Fájl: Idősorok", "1. hét"),
    ("Fájl: Iris_Data.csv", "1. hét"),
    ("Fájl: Klasszifikáció", "2. hét"),
    ("Fájl: LLM", "1. hét"),
    ("Fájl: Modellek általánosítása, regresszió", "3. hét"),
    ("Fájl: Nem felügyelt gépi tanítás - Cluster", "4. hét"),
    ("Fájl: Nem felügyelt gépi tanítás - Dimenzió csökkentés", "5. hét"),
    ("Fájl: Neurális hálózatok", "7. hét"),
    ("Fájl: Pandas (ismétlés)", "1. hét"),
    ("Fájl: Természetes nyelvi feldolgozás alapjai", "8. hét"),
    ("Fájl: Természetes nyelvi feldolgozás II", "11. hét"),
    ("Mappa: Előadás anyagok", NOT_WEEK_LINKED),
    ("Oldal: Előadások és gyakorlatok hanganyagai", NOT_WEEK_LINKED),
    ("URL: A Kaggle egy site ahol számtalan gépi tanulási feladatot és hozzátartozó adatbázist érhetünk el.", "1. hét"),
    ("URL: Anaconda telepítés - Windows", "1. hét"),
    ("URL: Anaconda telepítése", "1. hét"),
    ("URL: Anaconda telepítése - MacOS", "1. hét"),
    ("URL: Bevezetés a Jupyter Notebook használatába", "1. hét"),
    ("URL: Chatbot - Colab", "11. hét"),
    ("URL: Csoportosítás  (Colab)", "4. hét"),
    ("URL: Dimenzió csökkentés (Colab)", "5. hét"),
    ("URL: Dimenzió csökkentés (Gyakoró feladat megoldása; Colab)", "5. hét"),
    ("URL: Hogyan működik a neurális hálózat", "7. hét"),
    ("URL: Iris_Data.csv (http://web.uni-corvinus.hu/~fszabina/data/Iris_Data.csv)", "1. hét"),
    ("URL: Klasszifikáció (Colab)", "2. hét"),
    ("URL: Klasszifikáció (Gyakorló feladatok megoldása; Colab)", "2. hét"),
    ("URL: Klasszifikáció adat Orange_Telecom_Churn_Data.csv", "2. hét"),
    ("URL: Magyar női utónév generátor- Colab", "12. hét"),
    ("URL: Modellek általánosítása; regresszió", "3. hét"),
    ("URL: Modellek általánosítása; regresszió (Gyakorló feladatok megoldás; Colab)", "3. hét"),
    ("URL: Neurális hálózatok - Colab", "7. hét"),
    ("URL: Neurális hálózatok - Colab (megoldás)", "7. hét"),
    ("URL: Név generátor- Colab", "12. hét"),
    ("URL: NLP - Colab", "8. hét"),
    ("URL: NLP - megoldás (Colab)", "8. hét"),
    ("URL: Pandas gakorlat megoldása (Colab)", "1. hét"),
    ("URL: Pandas gyakorlat (Colab)", "1. hét"),
    ("URL: Regresszió adat Ames_Housing_Sales.csv", "3. hét"),
    ("URL: Regresszió gyakorló feladat", "3. hét"),
    ("URL: Regresszió gyakorló feladat (megoldás)", "3. hét"),
    ("URL: Utasszám előrejelzés (LSTM)- Colab", "12. hét"),
    ("URL: ChatGPT + saját dokumentum - Colab", "11. hét"),
    ("URL: Csoportosítás (Gyakorló feladat megoldása; Colab)", "4. hét"),
    ("URL: EXTRA - Gyakorló feladatok", "2. hét"),
    ("URL: Gyakorló feladat (zh-ra készülés) - Felügyelt tanulás", "4. hét"),
    ("URL: Gyakorló feladat (zh-ra készülés) - Felügyelt tanulás (megoldás)", "4. hét"),
    ("URL: Gyakorló feladatok (ZH-ra készülés) - nem felügyelt gépi tanítás", "5. hét"),
    ("URL: Gyakorló feladatok (ZH-ra készülés) - nem felügyelt gépi tanítás (megoldás)", "5. hét"),
    ("URL: How neural network works", "7. hét"),
    ("URL: Keras", "12. hét"),
    ("URL: Legjobb regressziós modell kiválasztása", "3. hét"),
    ("URL: Magyar nyelvű szövegek előfeldolgozása", "8. hét"),
    ("URL: NLP online könyv", "8. hét"),
    ("URL: Playground - Neurális hálózatok", "7. hét"),
    ("URL: Practical Deep Learning", "7. hét"),
    ("URL: Tensorflow", "12. hét"),
    ("URL: Train/test vágás", "3. hét"),
    ("URL: Túltanulás/alultanulás", "3. hét"),
    ("Fájl: ChatGPT+saját dokumentum", "11. hét"),
    ("Fájl: EXTRA felatok - Pandas", "1. hét"),
    ("Fájl: EXTRA felatok - Pandas feladat adatai", "1. hét"),
    ("Fájl: MintaZH - gyakolat (adatok)", "5. hét"),
    ("Fájl: MintaZH - gyakorlat (feladatsor)", "5. hét"),
    ("Fájl: Modell értékelés (Racskó Péter)", "3. hét"),
    ("Teszt: MintaZH - elmélet", "5. hét"),
];

static WEEK_CATALOG: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| WEEK_PLAN.iter().copied().collect());

pub fn curriculum_week(context: &str) -> &'static str {
    WEEK_CATALOG.get(context).copied().unwrap_or(UNKNOWN_WEEK)
}

/// Leading integer of a `"12. hét"` style label.
pub fn parse_week_number(label: &str) -> Option<u32> {
    if !label.contains("hét") {
        return None;
    }
    label.split('.').next()?.trim().parse().ok()
}

pub fn attach_week_plan(rows: Vec<EventRow>) -> Vec<EventRow> {
    rows.into_iter()
        .map(|mut row| {
            let label = curriculum_week(&row.context);
            row.curriculum_week_num = parse_week_number(label);
            row.curriculum_week = Some(label.to_string());
            row
        })
        .collect()
}

/// Distinct (context, label, number) triples, numbered weeks first.
pub fn week_catalog(rows: &[EventRow]) -> Vec<WeekCatalogEntry> {
    let mut entries: Vec<WeekCatalogEntry> = rows
        .iter()
        .map(|row| WeekCatalogEntry {
            context: row.context.clone(),
            curriculum_week: row
                .curriculum_week
                .clone()
                .unwrap_or_else(|| UNKNOWN_WEEK.to_string()),
            curriculum_week_num: row.curriculum_week_num,
        })
        .collect();

    entries.sort_by(|a, b| {
        let by_num = match (a.curriculum_week_num, b.curriculum_week_num) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        by_num
            .then_with(|| a.curriculum_week.cmp(&b.curriculum_week))
            .then_with(|| a.context.cmp(&b.context))
    });
    entries.dedup();
    entries
}
