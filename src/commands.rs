/// Available commands, autocomplete, and parsing of the `:` prompt

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Argument hint shown in the overlay, if the command takes one
  pub argument: Option<&'static str>,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "news",
    aliases: &["n", "articles"],
    description: "Latest articles",
    argument: None,
  },
  Command {
    name: "search",
    aliases: &["find"],
    description: "Search articles",
    argument: Some("<text>"),
  },
  Command {
    name: "markets",
    aliases: &["m", "quotes", "stocks"],
    description: "Watchlist quotes and sentiment",
    argument: None,
  },
  Command {
    name: "quote",
    aliases: &["watch"],
    description: "Add a symbol to the watchlist",
    argument: Some("<symbol>"),
  },
  Command {
    name: "status",
    aliases: &["health", "st"],
    description: "API health, scraper and sources",
    argument: None,
  },
  Command {
    name: "refresh",
    aliases: &["reload"],
    description: "Refetch everything now",
    argument: None,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit newsdash",
    argument: None,
  },
];

/// What a submitted command asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
  News,
  Search(String),
  Markets,
  Quote(String),
  Status,
  Refresh,
  Quit,
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim_start().to_lowercase();

  // Once an argument is being typed, only the command itself is relevant
  if let Some((name, _)) = input_lower.split_once(char::is_whitespace) {
    return find(name).into_iter().collect();
  }

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

/// Exact lookup by name or alias
pub fn find(name: &str) -> Option<&'static Command> {
  COMMANDS
    .iter()
    .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Turn a submitted line into an action. The error is shown to the user.
pub fn parse(input: &str) -> Result<Action, String> {
  let input = input.trim();
  let (name, arg) = match input.split_once(char::is_whitespace) {
    Some((name, arg)) => (name, arg.trim()),
    None => (input, ""),
  };

  let Some(cmd) = find(&name.to_lowercase()) else {
    return Err(format!("unknown command: {}", name));
  };

  if let Some(hint) = cmd.argument {
    if arg.is_empty() {
      return Err(format!("usage: {} {}", cmd.name, hint));
    }
  }

  Ok(match cmd.name {
    "news" => Action::News,
    "search" => Action::Search(arg.to_string()),
    "markets" => Action::Markets,
    "quote" => Action::Quote(arg.to_uppercase()),
    "status" => Action::Status,
    "refresh" => Action::Refresh,
    _ => Action::Quit,
  })
}
