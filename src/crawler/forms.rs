use std::collections::HashMap;

use scraper::{Html, Selector};
use url::Url;

use crate::crawler::canonical::canonicalize;
use crate::models::{ExtractedLink, Form, FormInput, LinkType};

/// Extract every `<form>` on a page, along with a FORM_ACTION link per form
/// so the frontier admits the action target like any other discovered link
/// (spec §4.7). `page_url` resolves relative `action` attributes.
pub fn extract_forms(html: &str, page_url: &Url) -> (Vec<Form>, Vec<ExtractedLink>) {
    let document = Html::parse_document(html);
    let Ok(form_sel) = Selector::parse("form") else {
        return (Vec::new(), Vec::new());
    };

    let mut forms = Vec::new();
    let mut links = Vec::new();

    for form_el in document.select(&form_sel) {
        let raw_action = form_el.value().attr("action").unwrap_or("");
        let action_target = if raw_action.is_empty() {
            page_url.clone()
        } else {
            match canonicalize(raw_action, Some(page_url)) {
                Some(c) => c,
                None => continue,
            }
        };
        let method = form_el
            .value()
            .attr("method")
            .unwrap_or("GET")
            .to_ascii_uppercase();

        let inputs = extract_inputs(&form_el);

        let mut attributes = HashMap::new();
        attributes.insert("method".to_string(), method.clone());
        attributes.insert("input_count".to_string(), inputs.len().to_string());

        links.push(ExtractedLink {
            url: raw_action.to_string(),
            canonical_url: action_target.to_string(),
            link_type: LinkType::FormAction,
            text: None,
            attributes,
        });

        forms.push(Form {
            action: action_target.to_string(),
            method,
            inputs,
        });
    }

    (forms, links)
}

fn extract_inputs(form_el: &scraper::ElementRef) -> Vec<FormInput> {
    let mut inputs = Vec::new();

    if let Ok(sel) = Selector::parse("input") {
        for el in form_el.select(&sel) {
            let attrs = el.value();
            let name = match attrs.attr("name") {
                Some(n) => n.to_string(),
                None => continue,
            };
            inputs.push(FormInput {
                name,
                input_type: attrs.attr("type").unwrap_or("text").to_string(),
                value: attrs.attr("value").map(|v| v.to_string()),
                required: attrs.attr("required").is_some(),
                attributes: attrs
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }
    }

    if let Ok(sel) = Selector::parse("textarea") {
        for el in form_el.select(&sel) {
            let attrs = el.value();
            let Some(name) = attrs.attr("name") else {
                continue;
            };
            let value = el.text().collect::<String>();
            inputs.push(FormInput {
                name: name.to_string(),
                input_type: "textarea".to_string(),
                value: (!value.trim().is_empty()).then_some(value),
                required: attrs.attr("required").is_some(),
                attributes: attrs
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
        }
    }

    if let Ok(sel) = Selector::parse("select") {
        for el in form_el.select(&sel) {
            let attrs = el.value();
            let Some(name) = attrs.attr("name") else {
                continue;
            };
            let options = select_options(&el);
            let mut attributes: HashMap<String, String> = attrs
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            attributes.insert("options".to_string(), options.join(","));
            inputs.push(FormInput {
                name: name.to_string(),
                input_type: "select".to_string(),
                value: None,
                required: attrs.attr("required").is_some(),
                attributes,
            });
        }
    }

    inputs
}

fn select_options(select_el: &scraper::ElementRef) -> Vec<String> {
    let Ok(sel) = Selector::parse("option") else {
        return Vec::new();
    };
    select_el
        .select(&sel)
        .filter_map(|opt| {
            opt.value()
                .attr("value")
                .map(|v| v.to_string())
                .or_else(|| {
                    let text = opt.text().collect::<String>().trim().to_string();
                    (!text.is_empty()).then_some(text)
                })
        })
        .collect()
}
