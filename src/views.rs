//! HTML pages for the form and the prediction result

use crate::features::{FieldKind, FEATURE_SCHEMA};
use crate::types::prediction::PredictionResult;
use std::fmt::Write;

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"fr\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n{body}</body>\n</html>\n"
    )
}

/// Form with one numeric input per model feature, in schema order.
pub fn form_page() -> String {
    let mut body = String::from("<form action=\"/predict\" method=\"post\">\n");

    for spec in FEATURE_SCHEMA.iter() {
        let step = match spec.kind {
            FieldKind::Integer => "1",
            FieldKind::Float => "any",
        };
        let _ = writeln!(
            body,
            "<p><label for=\"{name}\">{name}</label> \
             <input type=\"number\" step=\"{step}\" id=\"{name}\" name=\"{name}\" value=\"{default}\"></p>",
            name = spec.name,
            step = step,
            default = spec.default,
        );
    }

    body.push_str("<p><button type=\"submit\">Prédire</button></p>\n</form>\n");
    page("Prédiction du risque de défaut", &body)
}

/// Result view carrying the predicted class and default probability.
pub fn result_page(result: &PredictionResult) -> String {
    let body = format!(
        "<p>Classe prédite : <strong id=\"prediction_classe\">{label}</strong></p>\n\
         <p>Probabilité de défaut : <strong id=\"prob_defaut\">{probability:.4}</strong> \
         ({percent:.1} %)</p>\n\
         <p>Niveau de risque : {level}</p>\n\
         <p><small>{id}</small></p>\n\
         <p><a href=\"/\">Nouvelle prédiction</a></p>\n",
        label = result.label,
        probability = result.default_probability,
        percent = result.default_probability * 100.0,
        level = result.risk_level.as_str(),
        id = result.prediction_id,
    );
    page("Résultat de la prédiction", &body)
}
