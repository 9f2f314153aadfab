//! Line-oriented command shell driving a [`Dashboard`].

use std::{fmt::Write as _, str::FromStr};

use avail_core::{
  dashboard::{Dashboard, ErrorKind, Phase, ProfileView, Snapshot},
  declaration::CurrentDeclaration,
  identity::PublicEntry,
  profile::PublicLookup,
  store::{
    Credentials, DeclarationRecords, IdentityService, MarkerStore, ProfileRecords,
    RegistryLookup,
  },
};

pub const HELP: &str = "\
commands:
  login <identifier>          sign in (secret is prompted)
  logout                      sign out and forget the session
  status                      show the dashboard
  declare <on|off> [note]     publish a new availability declaration
  lookup <@handle>            show another subject's public entry
  refresh                     reload profile and declaration
  whoami                      show the signed-in subject
  help                        this text
  quit                        leave";

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Login(String),
  Logout,
  Status,
  Declare { status: bool, annotation: String },
  Lookup(String),
  Refresh,
  Whoami,
  Help,
  Quit,
}

impl FromStr for Command {
  type Err = String;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match word.to_ascii_lowercase().as_str() {
      "login" if !rest.is_empty() => Ok(Self::Login(rest.to_owned())),
      "login" => Err("usage: login <identifier>".into()),
      "logout" => Ok(Self::Logout),
      "status" | "" => Ok(Self::Status),
      "declare" => {
        let (flag, annotation) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let status = match flag.to_ascii_lowercase().as_str() {
          "on" | "available" | "yes" => true,
          "off" | "unavailable" | "no" => false,
          _ => return Err("usage: declare <on|off> [note]".into()),
        };
        Ok(Self::Declare { status, annotation: annotation.trim().to_owned() })
      }
      "lookup" if !rest.is_empty() => Ok(Self::Lookup(rest.to_owned())),
      "lookup" => Err("usage: lookup <@handle>".into()),
      "refresh" => Ok(Self::Refresh),
      "whoami" => Ok(Self::Whoami),
      "help" | "?" => Ok(Self::Help),
      "quit" | "exit" => Ok(Self::Quit),
      other => Err(format!("unknown command {other:?}; try `help`")),
    }
  }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

fn phase_label(phase: &Phase) -> String {
  match phase {
    Phase::Unauthenticated => "signed out".into(),
    Phase::Authenticating => "signing in".into(),
    Phase::Ready => "ready".into(),
    Phase::Error(ErrorKind::Denied(m)) => format!("sign-in refused: {m}"),
    Phase::Error(ErrorKind::ProfileUnavailable(m)) => format!("profile unavailable: {m}"),
    Phase::Error(ErrorKind::DeclarationUnavailable(m)) => {
      format!("declaration unavailable: {m}")
    }
  }
}

fn declaration_line(current: &CurrentDeclaration) -> String {
  match current {
    CurrentDeclaration::Undeclared => CurrentDeclaration::Undeclared.label().to_owned(),
    CurrentDeclaration::Declared(d) => {
      let mut line = format!("{} \"{}\"", current.label(), d.annotation);
      if !d.is_provisional() {
        let _ = write!(line, " (since {})", d.created_at.format("%Y-%m-%d %H:%M UTC"));
      }
      line
    }
  }
}

/// Plain-text rendering of a dashboard snapshot.
pub fn render_snapshot(snap: &Snapshot) -> String {
  let mut out = format!("state:        {}\n", phase_label(&snap.phase));
  let Some(subject) = snap.subject else {
    return out;
  };
  let _ = writeln!(out, "subject:      {subject}");

  match &snap.profile {
    ProfileView::Loading => out.push_str("identity:     loading\n"),
    ProfileView::NotEstablished => out.push_str("identity:     not yet established\n"),
    ProfileView::Loaded(r) => {
      let _ = writeln!(out, "handle:       {}", r.display_handle());
      let _ = writeln!(out, "legal name:   {}", r.legal_name);
      let _ = writeln!(out, "born:         {}", r.date_of_birth);
      if let Some(maturity) = r.maturity_date() {
        let _ = writeln!(out, "maturity:     {maturity}");
      }
      let _ = writeln!(
        out,
        "registration: {} since {}",
        r.registration_status.as_str(),
        r.registration_date
      );
    }
  }

  match &snap.declaration {
    None => out.push_str("availability: loading\n"),
    Some(current) => {
      let _ = write!(out, "availability: {}", declaration_line(current));
      if snap.saving {
        out.push_str(" [saving]");
      }
      out.push('\n');
    }
  }
  if let Some(failure) = &snap.sync_failure {
    let _ = writeln!(out, "last change not saved: {failure}");
  }
  out
}

pub fn render_entry(entry: &PublicEntry) -> String {
  format!(
    "@{}  {}  ({})\navailability: {}\n",
    entry.handle,
    entry.legal_name,
    entry.registration_status.as_str(),
    declaration_line(&entry.current)
  )
}

// ─── Shell ───────────────────────────────────────────────────────────────────

/// What the read loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
  Continue,
  Quit,
}

pub struct Shell<I, M, P, D, L> {
  dashboard: Dashboard<I, M, P, D>,
  lookup:    PublicLookup<L>,
}

impl<I, M, P, D, L> Shell<I, M, P, D, L>
where
  I: IdentityService,
  M: MarkerStore,
  P: ProfileRecords,
  D: DeclarationRecords,
  L: RegistryLookup,
{
  pub fn new(dashboard: Dashboard<I, M, P, D>, lookup: PublicLookup<L>) -> Self {
    Self { dashboard, lookup }
  }

  /// Reconcile whatever session this process may have inherited.
  pub async fn start(&self) -> String { render_snapshot(&self.dashboard.resume().await) }

  pub async fn login(&self, identifier: &str, secret: String) -> String {
    match self.dashboard.login(Credentials::new(identifier, secret)).await {
      Ok(snap) => render_snapshot(&snap),
      Err(e) => format!("{e}\n"),
    }
  }

  /// Run one command other than `login`, which needs a secret prompt and goes
  /// through [`Self::login`].
  pub async fn execute(&self, command: Command) -> (String, Flow) {
    let output = match command {
      Command::Login(_) => "login needs a secret; use the prompt\n".to_owned(),
      Command::Logout => render_snapshot(&self.dashboard.logout().await),
      Command::Status => render_snapshot(&self.dashboard.snapshot()),
      Command::Refresh => render_snapshot(&self.dashboard.refresh().await),
      Command::Declare { status, annotation } => {
        match self.dashboard.submit_declaration(status, annotation).await {
          Ok(current) => format!("saved: {}\n", declaration_line(&current)),
          Err(e) => format!("{e}\n"),
        }
      }
      Command::Lookup(handle) => match self.dashboard.snapshot().subject {
        None => "sign in to look subjects up\n".to_owned(),
        Some(_) => match self.lookup.lookup(&handle).await {
          Ok(Some(entry)) => render_entry(&entry),
          Ok(None) => format!("no subject with handle {handle}\n"),
          Err(e) => format!("{e}\n"),
        },
      },
      Command::Whoami => match self.dashboard.guard().current_user().await {
        Some(subject) => format!("{subject}\n"),
        None => "not signed in\n".to_owned(),
      },
      Command::Help => format!("{HELP}\n"),
      Command::Quit => return (String::new(), Flow::Quit),
    };
    (output, Flow::Continue)
  }
}
