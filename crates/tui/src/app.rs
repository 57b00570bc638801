use std::{cmp, io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use pixelmart_core::{
    config::AppConfig, CheckoutPrompt, Controller, Modal, PaymentOutcome, PurchaseForm,
    PurchasePhase, Slot, StoreEvent,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const MAX_INPUT_LEN: usize = 120;
const CELL_WIDTH: usize = 5;

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    selection_fg: Color,
    available_bg: Color,
    sold_bg: Color,
    success: Color,
    warning: Color,
    on_accent: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Green,
            muted: Color::DarkGray,
            selection_bg: Color::Cyan,
            selection_fg: Color::Black,
            available_bg: Color::Black,
            sold_bg: Color::Rgb(64, 64, 64),
            success: Color::Green,
            warning: Color::Yellow,
            on_accent: Color::Black,
        }
    }
}

enum AppEvent {
    Input(Event),
    Tick,
}

/// Focusable controls of the purchase dialog, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormField {
    Company,
    Logo,
    Simulate,
    Cancel,
    Submit,
}

impl FormField {
    const ORDER: [FormField; 5] = [
        FormField::Company,
        FormField::Logo,
        FormField::Simulate,
        FormField::Cancel,
        FormField::Submit,
    ];

    fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.index() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.index() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// Single-line text input. `cursor` counts chars, not bytes.
#[derive(Debug, Clone, Default)]
struct TextInput {
    value: String,
    cursor: usize,
}

impl TextInput {
    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.value.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.char_len() as isize;
        self.cursor = (self.cursor as isize + delta).clamp(0, len) as usize;
    }

    fn move_home(&mut self) {
        self.cursor = 0;
    }

    fn move_end(&mut self) {
        self.cursor = self.char_len();
    }

    fn insert(&mut self, ch: char) {
        if ch.is_control() || self.char_len() >= MAX_INPUT_LEN {
            return;
        }
        let offset = self.byte_offset(self.cursor);
        self.value.insert(offset, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let offset = self.byte_offset(self.cursor);
        self.value.remove(offset);
    }

    fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let offset = self.byte_offset(self.cursor);
            self.value.remove(offset);
        }
    }
}

/// Widget state behind the purchase dialog. The storefront state decides
/// whether the dialog is open; this only holds what the buyer typed.
#[derive(Debug, Clone)]
struct PurchaseDialog {
    company: TextInput,
    logo: TextInput,
    simulate: bool,
    focus: FormField,
}

impl PurchaseDialog {
    fn new(simulate: bool) -> Self {
        Self {
            company: TextInput::default(),
            logo: TextInput::default(),
            simulate,
            focus: FormField::Company,
        }
    }

    fn form(&self) -> PurchaseForm {
        PurchaseForm {
            company_name: self.company.value.clone(),
            logo_url: self.logo.value.clone(),
            simulate: self.simulate,
        }
    }

    fn focused_input(&mut self) -> Option<&mut TextInput> {
        match self.focus {
            FormField::Company => Some(&mut self.company),
            FormField::Logo => Some(&mut self.logo),
            _ => None,
        }
    }
}

/// What a key press in the purchase dialog asks the app to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogAction {
    None,
    Submit,
    Cancel,
}

/// Terminal storefront: pixel grid, purchase dialog, checkout dialog and
/// notification banner over a [`Controller`].
pub struct StorefrontApp {
    config: AppConfig,
    controller: Controller,
    store_rx: Option<mpsc::Receiver<StoreEvent>>,
    prompt_rx: Option<mpsc::Receiver<CheckoutPrompt>>,
    checkout: Option<CheckoutPrompt>,
    dialog: Option<PurchaseDialog>,
    cursor: (usize, usize),
    col_offset: usize,
    theme: Theme,
    should_quit: bool,
}

impl StorefrontApp {
    pub fn new(config: AppConfig, controller: Controller) -> Self {
        Self {
            config,
            controller,
            store_rx: None,
            prompt_rx: None,
            checkout: None,
            dialog: None,
            cursor: (0, 0),
            col_offset: 0,
            theme: Theme::default(),
            should_quit: false,
        }
    }

    pub fn attach_channels(
        &mut self,
        store_rx: mpsc::Receiver<StoreEvent>,
        prompt_rx: mpsc::Receiver<CheckoutPrompt>,
    ) {
        self.store_rx = Some(store_rx);
        self.prompt_rx = Some(prompt_rx);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut store_rx = self
            .store_rx
            .take()
            .context("storefront event channel not attached")?;
        let mut prompt_rx = self
            .prompt_rx
            .take()
            .context("checkout channel not attached")?;

        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let result = loop {
            if let Err(err) = terminal.draw(|frame| self.draw(frame)) {
                break Err(err.into());
            }
            if self.should_quit {
                break Ok(());
            }

            tokio::select! {
                maybe_event = event_rx.recv() => {
                    match maybe_event {
                        Some(AppEvent::Input(event)) => self.handle_input(event),
                        Some(AppEvent::Tick) => {}
                        None => break Ok(()),
                    }
                }
                Some(event) = store_rx.recv() => self.handle_store_event(event),
                Some(prompt) = prompt_rx.recv() => self.open_checkout(prompt),
            }
        };

        restore_terminal(&mut terminal)?;
        if let Some(prompt) = self.checkout.take() {
            prompt.resolve(PaymentOutcome::Dismissed);
        }
        info!(sold = self.controller.state().slots().sold_count(), "Storefront closed");
        result
    }

    fn handle_store_event(&mut self, event: StoreEvent) {
        if let Err(err) = self.controller.handle_event(event) {
            debug!(%err, "Purchase step reported an error");
        }
        self.sync_dialog();
    }

    fn open_checkout(&mut self, prompt: CheckoutPrompt) {
        let reference = &prompt.request.order_reference;
        if !awaits_checkout(self.controller.state().purchase(), reference) {
            info!(order = %reference, "Checkout for an abandoned purchase dismissed");
            prompt.resolve(PaymentOutcome::Dismissed);
            return;
        }
        info!(order = %reference, "Showing checkout");
        if let Some(previous) = self.checkout.replace(prompt) {
            previous.resolve(PaymentOutcome::Dismissed);
        }
    }

    /// Keep the dialog widget in step with the storefront's modal state.
    fn sync_dialog(&mut self) {
        match self.controller.state().modal() {
            Modal::Open { .. } => {
                if self.dialog.is_none() {
                    self.dialog = Some(PurchaseDialog::new(
                        self.config.checkout.simulate_by_default,
                    ));
                }
            }
            Modal::Closed => self.dialog = None,
        }
    }

    fn handle_input(&mut self, event: Event) {
        let Event::Key(key) = event else {
            return;
        };
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers == KeyModifiers::CONTROL && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.checkout.is_some() {
            self.handle_checkout_key(key);
        } else if self.dialog.is_some() {
            self.handle_dialog_key(key);
        } else {
            self.handle_grid_key(key);
        }
    }

    fn handle_grid_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
            }
            KeyCode::Char('h') | KeyCode::Left => self.move_cursor(0, -1),
            KeyCode::Char('l') | KeyCode::Right => self.move_cursor(0, 1),
            KeyCode::Char('k') | KeyCode::Up => self.move_cursor(-1, 0),
            KeyCode::Char('j') | KeyCode::Down => self.move_cursor(1, 0),
            KeyCode::Home => self.cursor.1 = 0,
            KeyCode::End => {
                self.cursor.1 = self.controller.state().slots().cols().saturating_sub(1)
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.select_cursor_slot(),
            _ => {}
        }
    }

    fn move_cursor(&mut self, delta_row: isize, delta_col: isize) {
        let slots = self.controller.state().slots();
        let max_row = slots.rows().saturating_sub(1) as isize;
        let max_col = slots.cols().saturating_sub(1) as isize;
        let row = (self.cursor.0 as isize + delta_row).clamp(0, max_row);
        let col = (self.cursor.1 as isize + delta_col).clamp(0, max_col);
        self.cursor = (row as usize, col as usize);
    }

    fn cursor_slot(&self) -> Option<&Slot> {
        self.controller
            .state()
            .slots()
            .at(self.cursor.0, self.cursor.1)
    }

    fn select_cursor_slot(&mut self) {
        let Some(slot_id) = self.cursor_slot().map(Slot::id) else {
            return;
        };
        match self.controller.select(slot_id) {
            Ok(()) => info!(slot_id, "Purchase dialog opened"),
            Err(err) => debug!(slot_id, %err, "Selection refused"),
        }
        self.sync_dialog();
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let loading = self.controller.state().is_loading();
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        match dialog_key_action(dialog, key) {
            DialogAction::None => {}
            DialogAction::Cancel => {
                self.controller.dismiss();
                self.sync_dialog();
            }
            DialogAction::Submit if loading => {
                debug!("Submit ignored while a purchase is in progress");
            }
            DialogAction::Submit => {
                let form = dialog.form();
                if let Err(err) = self.controller.submit(&form) {
                    debug!(%err, "Submission refused");
                }
                self.sync_dialog();
            }
        }
    }

    fn handle_checkout_key(&mut self, key: KeyEvent) {
        let outcome = match key.code {
            KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('P') => PaymentOutcome::Success,
            KeyCode::Esc | KeyCode::Char('d') | KeyCode::Char('D') => PaymentOutcome::Dismissed,
            _ => return,
        };
        if let Some(prompt) = self.checkout.take() {
            info!(order = %prompt.request.order_reference, ?outcome, "Checkout answered");
            prompt.resolve(outcome);
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.size();
        let banner_height = if self.controller.state().notification().message().is_some() {
            3
        } else {
            0
        };
        let grid_height = (self.controller.state().slots().rows() as u16).saturating_add(2);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(banner_height),
                Constraint::Length(grid_height),
                Constraint::Min(6),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_header(frame, layout[0]);
        self.render_banner(frame, layout[1]);
        self.render_grid(frame, layout[2]);
        self.render_details(frame, layout[3]);
        self.render_footer(frame, layout[4]);

        if let Some(dialog) = &self.dialog {
            self.render_purchase_dialog(frame, dialog);
        }
        if let Some(prompt) = &self.checkout {
            self.render_checkout(frame, prompt);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let slots = self.controller.state().slots();
        let checkout = &self.config.checkout;
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let title = Paragraph::new(vec![
            Line::from(Span::styled(
                checkout.merchant_name.clone(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                checkout.tagline.clone(),
                Style::default().fg(self.theme.muted),
            )),
        ])
        .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(title, columns[0]);

        let stats = Paragraph::new(vec![
            Line::from(format!(
                "Grid: {} x {} • Slots: {}",
                slots.cols(),
                slots.rows(),
                slots.len()
            )),
            Line::from(Span::styled(
                format!(
                    "Sold: {}  Available: {}",
                    slots.sold_count(),
                    slots.available_count()
                ),
                Style::default().fg(self.theme.muted),
            )),
        ])
        .alignment(Alignment::Right)
        .block(Block::default().borders(Borders::BOTTOM));
        frame.render_widget(stats, columns[1]);
    }

    fn render_banner(&self, frame: &mut Frame, area: Rect) {
        let Some(message) = self.controller.state().notification().message() else {
            return;
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(
            message.to_string(),
            Style::default()
                .fg(self.theme.success)
                .add_modifier(Modifier::BOLD),
        )))
        .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_grid(&mut self, frame: &mut Frame, area: Rect) {
        let visible_cols = (area.width.saturating_sub(2) as usize / CELL_WIDTH).max(1);
        self.col_offset = scroll_offset(self.col_offset, self.cursor.1, visible_cols);

        let state = self.controller.state();
        let slots = state.slots();
        let selected = state.modal().selected();
        let lines: Vec<Line> = slots
            .rows_iter()
            .enumerate()
            .map(|(row, cells)| {
                let spans: Vec<Span> = cells
                    .iter()
                    .enumerate()
                    .skip(self.col_offset)
                    .take(visible_cols)
                    .map(|(col, slot)| {
                        let under_cursor = (row, col) == self.cursor;
                        let style = self.cell_style(slot, under_cursor, selected == Some(slot.id()));
                        Span::styled(cell_label(slot), style)
                    })
                    .collect();
                Line::from(spans)
            })
            .collect();

        let title = if self.col_offset > 0 || self.col_offset + visible_cols < slots.cols() {
            format!(
                "Pixel Grid (columns {}-{} of {})",
                self.col_offset + 1,
                cmp::min(self.col_offset + visible_cols, slots.cols()),
                slots.cols()
            )
        } else {
            "Pixel Grid".to_string()
        };
        let grid = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(grid, area);
    }

    fn cell_style(&self, slot: &Slot, under_cursor: bool, selected: bool) -> Style {
        if under_cursor || selected {
            return Style::default()
                .bg(self.theme.selection_bg)
                .fg(self.theme.selection_fg)
                .add_modifier(Modifier::BOLD);
        }
        if slot.is_sold() {
            Style::default()
                .bg(self.theme.sold_bg)
                .fg(self.theme.primary_fg)
        } else {
            Style::default()
                .bg(self.theme.available_bg)
                .fg(self.theme.muted)
        }
    }

    fn render_details(&self, frame: &mut Frame, area: Rect) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area);

        let pricing = self.controller.state().pricing();
        let mut lines = Vec::new();
        match self.cursor_slot() {
            Some(slot) => {
                lines.push(Line::from(Span::styled(
                    format!("Slot #{}", slot.id()),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(format!("Price: {}", pricing.format(slot.price()))));
                match slot.sale() {
                    Some(sale) => {
                        lines.push(Line::from(format!("Owner: {}", sale.owner)));
                        lines.push(Line::from(format!(
                            "Logo: {}",
                            sale.logo_url.as_deref().unwrap_or("(none)")
                        )));
                        lines.push(Line::from(format!(
                            "Sold: {}",
                            sale.sold_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                        )));
                    }
                    None => {
                        lines.push(Line::from(Span::styled(
                            "Available - press Enter to buy",
                            Style::default().fg(self.theme.accent),
                        )));
                    }
                }
            }
            None => lines.push(Line::from("No slot under cursor")),
        }
        let details = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Slot"))
            .wrap(Wrap { trim: true });
        frame.render_widget(details, columns[0]);

        let legend = Paragraph::new(vec![
            Line::from(vec![
                Span::styled("     ", Style::default().bg(self.theme.available_bg)),
                Span::raw(" Available"),
            ]),
            Line::from(vec![
                Span::styled("     ", Style::default().bg(self.theme.sold_bg)),
                Span::raw(" Sold"),
            ]),
            Line::from(vec![
                Span::styled("     ", Style::default().bg(self.theme.selection_bg)),
                Span::raw(" Cursor"),
            ]),
        ])
        .block(Block::default().borders(Borders::ALL).title("Legend"));
        frame.render_widget(legend, columns[1]);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let help = if self.checkout.is_some() {
            "Enter pay  Esc dismiss"
        } else if self.dialog.is_some() {
            "Tab next field  Space toggle  Enter submit  Esc cancel"
        } else {
            "Arrows/hjkl move  Enter buy  q quit"
        };
        let note = format!(
            "Built for {} • Demo payment setup (replace key and implement server-side order creation)",
            self.config.checkout.merchant_name
        );
        let footer = Paragraph::new(vec![
            Line::from(Span::styled(
                help,
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(note, Style::default().fg(self.theme.muted))),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
        frame.render_widget(footer, area);
    }

    fn render_purchase_dialog(&self, frame: &mut Frame, dialog: &PurchaseDialog) {
        let state = self.controller.state();
        let Some(slot) = state.selected() else {
            return;
        };
        let pricing = state.pricing();
        let area = centered_rect(64, 15, frame.size());
        frame.render_widget(Clear, area);

        let focus_style = |field: FormField| {
            if dialog.focus == field {
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(self.theme.primary_fg)
            }
        };
        let marker = |field: FormField| if dialog.focus == field { "> " } else { "  " };

        let submit_label = if state.is_loading() {
            match state.purchase() {
                PurchasePhase::AwaitingPayment { .. } => "Awaiting payment...".to_string(),
                _ => "Processing...".to_string(),
            }
        } else {
            dialog.form().submit_label(pricing, slot.price())
        };
        let submit_style = if state.is_loading() {
            Style::default().fg(self.theme.muted)
        } else if dialog.focus == FormField::Submit {
            Style::default()
                .bg(self.theme.accent)
                .fg(self.theme.on_accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.accent)
        };

        let lines = vec![
            Line::from(vec![
                Span::raw("Price: "),
                Span::styled(
                    pricing.format(slot.price()),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::from(""),
            Line::from(Span::styled("Company name", Style::default().fg(self.theme.muted))),
            Line::from(vec![
                Span::styled(marker(FormField::Company), focus_style(FormField::Company)),
                Span::raw(dialog.company.value.clone()),
            ]),
            Line::from(Span::styled(
                "Logo URL (image)",
                Style::default().fg(self.theme.muted),
            )),
            Line::from(vec![
                Span::styled(marker(FormField::Logo), focus_style(FormField::Logo)),
                Span::raw(dialog.logo.value.clone()),
            ]),
            Line::from(""),
            Line::from(Span::styled(
                format!(
                    "{}[{}] Simulate purchase (dev mode, no payment)",
                    marker(FormField::Simulate),
                    if dialog.simulate { "x" } else { " " }
                ),
                focus_style(FormField::Simulate),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled(
                    format!("{}[ Cancel ]", marker(FormField::Cancel)),
                    focus_style(FormField::Cancel),
                ),
                Span::raw("   "),
                Span::styled(
                    format!("{}[ {} ]", marker(FormField::Submit), submit_label),
                    submit_style,
                ),
            ]),
        ];

        let paragraph = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Buy Pixel Slot #{}", slot.id())),
        );
        frame.render_widget(paragraph, area);

        let input_row = match dialog.focus {
            FormField::Company => Some((4, dialog.company.cursor)),
            FormField::Logo => Some((6, dialog.logo.cursor)),
            _ => None,
        };
        if let Some((row, cursor)) = input_row {
            let cursor_x =
                (area.x + 3 + cursor as u16).min(area.x + area.width.saturating_sub(2));
            frame.set_cursor(cursor_x, area.y + row);
        }
    }

    fn render_checkout(&self, frame: &mut Frame, prompt: &CheckoutPrompt) {
        let request = &prompt.request;
        let area = centered_rect(56, 11, frame.size());
        frame.render_widget(Clear, area);

        let lines = vec![
            Line::from(Span::styled(
                request.description.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(format!(
                "Amount: {} {}",
                request.currency,
                format_minor_units(request.amount_minor)
            )),
            Line::from(format!("Order: {}", request.order_reference)),
            Line::from(format!("Name: {}", request.prefill.name)),
            Line::from(""),
            Line::from(Span::styled(
                "Demo checkout - no money is moved.",
                Style::default().fg(self.theme.warning),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" pay  "),
                Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" dismiss"),
            ]),
        ];
        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} - Checkout", request.merchant_name)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }
}

fn dialog_key_action(dialog: &mut PurchaseDialog, key: KeyEvent) -> DialogAction {
    match key.code {
        KeyCode::Esc => return DialogAction::Cancel,
        KeyCode::Tab | KeyCode::Down => {
            dialog.focus = dialog.focus.next();
            return DialogAction::None;
        }
        KeyCode::BackTab | KeyCode::Up => {
            dialog.focus = dialog.focus.prev();
            return DialogAction::None;
        }
        _ => {}
    }

    match dialog.focus {
        FormField::Simulate => match key.code {
            KeyCode::Char(' ') | KeyCode::Enter => {
                dialog.simulate = !dialog.simulate;
                DialogAction::None
            }
            _ => DialogAction::None,
        },
        FormField::Cancel => match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => DialogAction::Cancel,
            KeyCode::Right => {
                dialog.focus = FormField::Submit;
                DialogAction::None
            }
            _ => DialogAction::None,
        },
        FormField::Submit => match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => DialogAction::Submit,
            KeyCode::Left => {
                dialog.focus = FormField::Cancel;
                DialogAction::None
            }
            _ => DialogAction::None,
        },
        FormField::Company | FormField::Logo => {
            let Some(input) = dialog.focused_input() else {
                return DialogAction::None;
            };
            match key.code {
                // Enter inside a text input submits the form.
                KeyCode::Enter => return DialogAction::Submit,
                KeyCode::Left => input.move_cursor(-1),
                KeyCode::Right => input.move_cursor(1),
                KeyCode::Home => input.move_home(),
                KeyCode::End => input.move_end(),
                KeyCode::Backspace => input.backspace(),
                KeyCode::Delete => input.delete(),
                KeyCode::Char(ch)
                    if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
                {
                    input.insert(ch)
                }
                _ => {}
            }
            DialogAction::None
        }
    }
}

/// Whether `phase` is still waiting on the checkout for `reference`.
fn awaits_checkout(phase: &PurchasePhase, reference: &str) -> bool {
    matches!(phase, PurchasePhase::AwaitingPayment { order, .. } if order.reference == reference)
}

/// Fixed-width grid label: the price while available, owner initials once sold.
fn cell_label(slot: &Slot) -> String {
    let text = match slot.owner() {
        Some(owner) => initials(owner),
        None => slot.price().to_string(),
    };
    format!("{:^width$}", text, width = CELL_WIDTH)
}

fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .collect();
    if letters.chars().count() >= 2 {
        return letters.to_uppercase();
    }
    name.chars().take(3).collect::<String>().to_uppercase()
}

/// Keep `cursor` within a window of `visible` columns starting at `offset`.
fn scroll_offset(offset: usize, cursor: usize, visible: usize) -> usize {
    if cursor < offset {
        cursor
    } else if cursor >= offset + visible {
        cursor + 1 - visible
    } else {
        offset
    }
}

fn format_minor_units(amount: u64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crossterm::event::KeyEventState;
    use pixelmart_core::{AttemptId, BuyerDetails, Order};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn text_input_edits_at_cursor() {
        let mut input = TextInput::default();
        for ch in "Acme".chars() {
            input.insert(ch);
        }
        input.move_cursor(-2);
        input.backspace();
        assert_eq!(input.value, "Ame");
        input.move_home();
        input.delete();
        assert_eq!(input.value, "me");
        input.move_end();
        input.insert('\u{7}');
        input.move_cursor(10);
        assert_eq!(input.cursor, 2);
    }

    #[test]
    fn text_input_keeps_non_ascii_text() {
        let mut input = TextInput::default();
        for ch in "Café".chars() {
            input.insert(ch);
        }
        assert_eq!(input.value, "Café");
        assert_eq!(input.cursor, 4);

        input.backspace();
        assert_eq!(input.value, "Caf");
        input.insert('é');
        input.move_cursor(-1);
        input.insert('₹');
        assert_eq!(input.value, "Caf₹é");
        input.delete();
        assert_eq!(input.value, "Caf₹");
        input.move_end();
        assert_eq!(input.cursor, 4);
    }

    #[test]
    fn tab_order_wraps() {
        assert_eq!(FormField::Submit.next(), FormField::Company);
        assert_eq!(FormField::Company.prev(), FormField::Submit);
        assert_eq!(FormField::Logo.next(), FormField::Simulate);
    }

    #[test]
    fn dialog_keys_fill_form_and_submit() {
        let mut dialog = PurchaseDialog::new(false);
        for ch in "Acme".chars() {
            assert_eq!(dialog_key_action(&mut dialog, key(KeyCode::Char(ch))), DialogAction::None);
        }
        dialog_key_action(&mut dialog, key(KeyCode::Tab));
        dialog_key_action(&mut dialog, key(KeyCode::Tab));
        assert_eq!(dialog.focus, FormField::Simulate);
        dialog_key_action(&mut dialog, key(KeyCode::Char(' ')));
        assert!(dialog.form().simulate);
        assert_eq!(dialog.form().company_name, "Acme");

        dialog.focus = FormField::Company;
        assert_eq!(
            dialog_key_action(&mut dialog, key(KeyCode::Enter)),
            DialogAction::Submit
        );
        assert_eq!(
            dialog_key_action(&mut dialog, key(KeyCode::Esc)),
            DialogAction::Cancel
        );
    }

    #[test]
    fn checkout_only_opens_for_the_awaited_order() {
        let order = Order {
            reference: "order_fake_1234abcd".to_string(),
            amount_minor: 80_000,
            currency: "INR".to_string(),
            created_at: Utc::now(),
        };
        let awaiting = PurchasePhase::AwaitingPayment {
            attempt: AttemptId(1),
            slot_id: 3,
            buyer: BuyerDetails {
                company_name: "Acme".to_string(),
                logo_url: None,
            },
            order,
        };
        assert!(awaits_checkout(&awaiting, "order_fake_1234abcd"));
        assert!(!awaits_checkout(&awaiting, "order_fake_ffff0000"));
        assert!(!awaits_checkout(&PurchasePhase::Idle, "order_fake_1234abcd"));
    }

    #[test]
    fn labels_fit_cell_width() {
        let slot = Slot::new(3, 800);
        assert_eq!(cell_label(&slot), " 800 ");
        assert_eq!(initials("Acme Widgets Ltd"), "AW");
        assert_eq!(initials("acme"), "ACM");
    }

    #[test]
    fn scroll_keeps_cursor_visible() {
        assert_eq!(scroll_offset(0, 3, 10), 0);
        assert_eq!(scroll_offset(0, 12, 10), 3);
        assert_eq!(scroll_offset(5, 2, 10), 2);
        assert_eq!(format_minor_units(80_000), "800.00");
    }
}
