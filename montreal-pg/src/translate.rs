//! Tables de traduction des libellés

/// Traduction d'un libellé : inconnu = renvoyé tel quel
pub type Translator = fn(&str) -> String;

/// Retrouve une table de traduction par son nom de configuration
pub fn lookup(name: &str) -> Option<Translator> {
    match name {
        "land_use_en" => Some(translate_affectation),
        _ => None,
    }
}

/// Affectation du sol (schéma d'aménagement) vers l'anglais
pub fn translate_affectation(fr_name: &str) -> String {
    let en = match fr_name {
        "Activités diversifiées" => "Mixed Use",
        "Agricole" => "Agricultural",
        "Centre-ville d'agglomération" => "Downtown Core",
        "Conservation" => "Conservation",
        "Dominante résidentielle" => "Residential",
        "Grand espace vert ou récréation" => "Parks & Recreation",
        "Grande emprise ou grande infrastructure publique" => "Public Infrastructure",
        "Industrie" => "Industrial",
        other => other,
    };
    en.to_string()
}
