use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped inside a query component. Conservative superset of
/// the reserved set so queries round-trip through any router verbatim.
const QUERY: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'=')
    .add(b'?');

const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'%')
    .add(b'/')
    .add(b'?');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    #[default]
    Title,
    Tags,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Title => "title",
            SearchMode::Tags => "tags",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SearchMode::Title => SearchMode::Tags,
            SearchMode::Tags => SearchMode::Title,
        }
    }
}

/// Navigation targets produced by the controllers. The embedding
/// front-end owns the actual router; it only ever sees these as paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    SignIn,
    Search { query: String, mode: SearchMode },
    Video(String),
    Channel(String),
    Panel(String),
}

impl Route {
    pub fn to_path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::SignIn => "/signin".to_string(),
            Route::Search { query, mode } => format!(
                "/search?q={}&type={}",
                utf8_percent_encode(query, QUERY),
                mode.as_str()
            ),
            Route::Video(id) => format!("/video/{}", utf8_percent_encode(id, SEGMENT)),
            Route::Channel(id) => format!("/users/find/{}", utf8_percent_encode(id, SEGMENT)),
            Route::Panel(id) => format!("/users/panel/{}", utf8_percent_encode(id, SEGMENT)),
        }
    }
}
