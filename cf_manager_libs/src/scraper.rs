use crate::models::{
    ContestDigest, Member, Problem, Role, Standings, StandingsRow, SubmissionDigest,
    SubmissionPage,
};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

fn text_of(elem: &ElementRef<'_>) -> String {
    elem.text().collect::<String>().trim().to_string()
}

fn last_page_index(html: &Html, selector: &Selector) -> u32 {
    html.select(selector)
        .filter_map(|span| span.value().attr("pageindex"))
        .filter_map(|index| index.parse::<u32>().ok())
        .max()
        .unwrap_or(1)
}

/// Parts of the common page header: CSRF token and the logged-in user.
pub struct HeaderScraper {
    csrf_input: Selector,
    csrf_meta: Selector,
    chooser: Selector,
    a: Selector,
}

impl HeaderScraper {
    pub fn new() -> Self {
        Self {
            csrf_input: Selector::parse(r#"input[name="csrf_token"]"#).unwrap(),
            csrf_meta: Selector::parse(r#"meta[name="X-Csrf-Token"]"#).unwrap(),
            chooser: Selector::parse("div.lang-chooser > div").unwrap(),
            a: Selector::parse("a").unwrap(),
        }
    }

    pub fn extract_csrf_token(&self, html: &str) -> Option<String> {
        let html = Html::parse_document(html);

        html.select(&self.csrf_input)
            .find_map(|input| input.value().attr("value"))
            .or_else(|| {
                html.select(&self.csrf_meta)
                    .find_map(|meta| meta.value().attr("content"))
            })
            .map(String::from)
    }

    /// Returns `None` when the header shows the "Enter" link instead of a user.
    pub fn extract_username(&self, html: &str) -> Option<String> {
        let html = Html::parse_document(html);

        let username = html
            .select(&self.chooser)
            .nth(1)
            .and_then(|div| div.select(&self.a).next())
            .map(|a| text_of(&a))?;

        if username.is_empty() || username == "Enter" {
            None
        } else {
            Some(username)
        }
    }
}

pub struct MembersPageScraper {
    tr: Selector,
    td: Selector,
    user: Selector,
    hidden: Selector,
    confirm: Selector,
}

impl MembersPageScraper {
    pub fn new() -> Self {
        Self {
            tr: Selector::parse("table tr").unwrap(),
            td: Selector::parse("td").unwrap(),
            user: Selector::parse("a.rated-user").unwrap(),
            hidden: Selector::parse(r#"input[type="hidden"]"#).unwrap(),
            confirm: Selector::parse(r#"input[name="confirmed"]"#).unwrap(),
        }
    }

    pub fn extract_members(&self, html: &str) -> Vec<Member> {
        let html = Html::parse_document(html);
        let mut members = Vec::new();

        for (i, tr) in html.select(&self.tr).enumerate() {
            let username = match tr.select(&self.user).next() {
                Some(a) => text_of(&a),
                None => continue,
            };

            let role_cell = tr
                .select(&self.td)
                .map(|td| text_of(&td))
                .find(|text| text.parse::<Role>().is_ok());
            let role = match role_cell.as_deref().map(str::parse::<Role>) {
                Some(Ok(role)) => role,
                _ => {
                    tracing::warn!("failed to extract the role of {} at row {}", username, i);
                    continue;
                }
            };

            let pending = tr.select(&self.confirm).next().is_some()
                || role_cell
                    .map(|text| text.to_lowercase().contains("pending"))
                    .unwrap_or(false);

            let form_fields: BTreeMap<String, String> = tr
                .select(&self.hidden)
                .filter_map(|input| {
                    let name = input.value().attr("name")?;
                    let value = input.value().attr("value").unwrap_or_default();
                    Some((name.to_string(), value.to_string()))
                })
                .collect();

            members.push(Member {
                username,
                role,
                pending,
                form_fields,
            });
        }

        members
    }
}

pub struct ContestsPageScraper {
    tr: Selector,
    td: Selector,
    checkbox: Selector,
    title: Selector,
}

impl ContestsPageScraper {
    pub fn new() -> Self {
        Self {
            tr: Selector::parse("tr[data-contestid]").unwrap(),
            td: Selector::parse("td").unwrap(),
            checkbox: Selector::parse(r#"input[type="checkbox"]"#).unwrap(),
            title: Selector::parse(".rtable th a").unwrap(),
        }
    }

    pub fn extract_contests(&self, html: &str) -> Vec<ContestDigest> {
        let html = Html::parse_document(html);

        html.select(&self.tr)
            .filter_map(|tr| {
                let contest_id = tr
                    .value()
                    .attr("data-contestid")
                    .and_then(|id| id.trim().parse::<u64>().ok())?;
                let name = tr
                    .select(&self.td)
                    .next()
                    .and_then(|td| {
                        td.text()
                            .map(str::trim)
                            .find(|line| !line.is_empty())
                            .map(String::from)
                    })
                    .unwrap_or_else(|| {
                        tracing::warn!("failed to extract the name of contest {}", contest_id);
                        String::default()
                    });
                let manager_mode = tr
                    .select(&self.checkbox)
                    .next()
                    .map(|input| input.value().attr("checked").is_some())
                    .unwrap_or(false);

                Some(ContestDigest {
                    contest_id,
                    name,
                    manager_mode,
                })
            })
            .collect()
    }

    pub fn extract_contest_name(&self, html: &str) -> Option<String> {
        let html = Html::parse_document(html);

        html.select(&self.title)
            .next()
            .map(|a| text_of(&a))
            .filter(|name| !name.is_empty())
    }
}

pub struct StatusPageScraper {
    tr: Selector,
    td: Selector,
    author: Selector,
    problem: Selector,
    verdict: Selector,
    page_index: Selector,
    source: Selector,
}

impl StatusPageScraper {
    pub fn new() -> Self {
        Self {
            tr: Selector::parse("table.status-frame-datatable tr[data-submission-id]").unwrap(),
            td: Selector::parse("td").unwrap(),
            author: Selector::parse("td.status-party-cell a").unwrap(),
            problem: Selector::parse(r#"a[href*="/problem/"]"#).unwrap(),
            verdict: Selector::parse("span.submissionVerdictWrapper").unwrap(),
            page_index: Selector::parse("div.pagination span.page-index").unwrap(),
            source: Selector::parse("pre#program-source-text").unwrap(),
        }
    }

    pub fn extract_submissions(&self, html: &str) -> SubmissionPage {
        let html = Html::parse_document(html);
        let mut submissions = Vec::new();

        for tr in html.select(&self.tr) {
            let submission_id = match tr
                .value()
                .attr("data-submission-id")
                .and_then(|id| id.trim().parse::<u64>().ok())
            {
                Some(id) => id,
                None => {
                    tracing::warn!("failed to extract a submission id from the status table");
                    continue;
                }
            };
            let td: Vec<ElementRef<'_>> = tr.select(&self.td).collect();

            let author = match tr.select(&self.author).next() {
                Some(a) => text_of(&a),
                None => {
                    tracing::warn!("failed to extract the author of submission {}", submission_id);
                    continue;
                }
            };
            let problem = match tr
                .select(&self.problem)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| href.trim_end_matches('/').rsplit('/').next())
            {
                Some(index) => index.to_string(),
                None => {
                    tracing::warn!("failed to extract the problem of submission {}", submission_id);
                    continue;
                }
            };
            let language = td.get(4).map(text_of).unwrap_or_default();
            let verdict = tr
                .select(&self.verdict)
                .next()
                .and_then(|span| span.value().attr("submissionverdict"))
                .map(String::from)
                .or_else(|| td.get(5).map(text_of))
                .unwrap_or_default();

            submissions.push(SubmissionDigest {
                submission_id,
                author,
                problem,
                language,
                verdict,
            });
        }

        SubmissionPage {
            submissions,
            last_page: last_page_index(&html, &self.page_index),
        }
    }

    pub fn extract_source(&self, html: &str) -> Option<String> {
        let html = Html::parse_document(html);

        html.select(&self.source)
            .next()
            .map(|pre| pre.text().collect::<String>())
    }
}

pub struct StandingsPageScraper {
    header: Selector,
    tr: Selector,
    handle: Selector,
    party: Selector,
    cell: Selector,
    accepted: Selector,
    page_index: Selector,
}

fn parse_points(text: &str) -> f64 {
    let text = text.trim();
    if text.starts_with('+') {
        1.0
    } else {
        text.parse::<f64>().unwrap_or(0.0)
    }
}

impl StandingsPageScraper {
    pub fn new() -> Self {
        Self {
            header: Selector::parse(r#"table.standings th a[href*="/problem/"]"#).unwrap(),
            tr: Selector::parse("table.standings tr[participantid]").unwrap(),
            handle: Selector::parse("td.contestant-cell a.rated-user").unwrap(),
            party: Selector::parse("td.contestant-cell").unwrap(),
            cell: Selector::parse("td[problemid]").unwrap(),
            accepted: Selector::parse("span.cell-accepted, span.cell-passed-system-test")
                .unwrap(),
            page_index: Selector::parse("div.pagination span.page-index").unwrap(),
        }
    }

    /// Extracts one standings page and the index of the last page.
    pub fn extract_standings(&self, html: &str) -> Option<(Standings, u32)> {
        let html = Html::parse_document(html);

        let problems: Vec<Problem> = html
            .select(&self.header)
            .map(|a| {
                let index = text_of(&a);
                let name = a
                    .value()
                    .attr("title")
                    .map(String::from)
                    .unwrap_or_else(|| index.clone());
                Problem { index, name }
            })
            .collect();
        if problems.is_empty() {
            tracing::warn!("failed to extract problems from the standings table");
            return None;
        }

        let mut rows = Vec::new();
        for (i, tr) in html.select(&self.tr).enumerate() {
            let handles: Vec<String> = tr.select(&self.handle).map(|a| text_of(&a)).collect();
            let handle = if handles.is_empty() {
                match tr.select(&self.party).next() {
                    Some(td) => text_of(&td),
                    None => {
                        tracing::warn!("failed to extract the contestant at row {}", i);
                        continue;
                    }
                }
            } else {
                handles.join(", ")
            };

            let mut points: Vec<f64> = tr
                .select(&self.cell)
                .map(|td| {
                    td.select(&self.accepted)
                        .next()
                        .map(|span| parse_points(&text_of(&span)))
                        .unwrap_or(0.0)
                })
                .collect();
            if points.len() != problems.len() {
                tracing::warn!(
                    "row of {} has {} problem cells, expected {}",
                    handle,
                    points.len(),
                    problems.len()
                );
                points.resize(problems.len(), 0.0);
            }

            rows.push(StandingsRow { handle, points });
        }

        let last_page = last_page_index(&html, &self.page_index);
        Some((Standings { problems, rows }, last_page))
    }
}
