use serde::Serialize;
use std::collections::BTreeMap;
use tera::{Context, Tera};

const LOGIN_TEMPLATE: &str = "login.html";
const DASHBOARD_TEMPLATE: &str = "dashboard.html";

#[derive(Serialize)]
struct LinkRow<'a> {
    key: &'a str,
    destination: &'a str,
}

/// HTML pages for the browser surface. Templates are compiled into the binary.
pub struct Pages {
    tera: Tera,
    title: String,
    login_path: String,
    logout_path: String,
}

impl Pages {
    pub fn new(title: &str, login_path: &str, logout_path: &str) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (LOGIN_TEMPLATE, include_str!("../templates/login.html")),
            (DASHBOARD_TEMPLATE, include_str!("../templates/dashboard.html")),
        ])?;
        Ok(Self {
            tera,
            title: title.to_string(),
            login_path: login_path.to_string(),
            logout_path: logout_path.to_string(),
        })
    }

    pub fn login(&self) -> Result<String, tera::Error> {
        let mut context = Context::new();
        context.insert("title", &self.title);
        context.insert("login_path", &self.login_path);
        self.tera.render(LOGIN_TEMPLATE, &context)
    }

    pub fn dashboard(&self, links: &BTreeMap<String, String>) -> Result<String, tera::Error> {
        let rows: Vec<LinkRow> = links
            .iter()
            .map(|(key, destination)| LinkRow { key, destination })
            .collect();
        let mut context = Context::new();
        context.insert("title", &self.title);
        context.insert("logout_path", &self.logout_path);
        context.insert("links", &rows);
        self.tera.render(DASHBOARD_TEMPLATE, &context)
    }
}
