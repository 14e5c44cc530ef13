use crate::config::MessageFormat;
use crate::schema::ObligationRecord;
use crate::utils::{format_currency, format_date_dmy};

/// Plain-text payment request for everything assigned to `recipient`.
///
/// Returns `None` when nothing is assigned to that recipient.
pub fn render_payment_message(
    obligations: &[ObligationRecord],
    protocol_name: &str,
    recipient: &str,
    format: &MessageFormat,
) -> Option<String> {
    let assigned: Vec<&ObligationRecord> = obligations
        .iter()
        .filter(|o| o.assigned_to.as_deref() == Some(recipient))
        .collect();
    if assigned.is_empty() {
        return None;
    }

    let or_placeholder = |value: Option<String>| value.unwrap_or_else(|| format.placeholder.clone());
    let total: f64 = assigned.iter().map(|o| o.amount).sum();

    let mut message = format!("🏠 *Casa - {}*\n", protocol_name);
    message.push_str(&format!(
        "Olá {}, seguem os pagamentos desta semana:\n\n",
        recipient
    ));

    for item in assigned {
        message.push_str(&format!("• *{}*\n", item.supplier));
        message.push_str(&format!("  Valor: {}\n", format_currency(item.amount, format)));
        message.push_str(&format!(
            "  Vencimento: {}\n",
            or_placeholder(item.due_date.map(format_date_dmy))
        ));
        message.push_str(&format!(
            "  Forma: {}\n",
            or_placeholder(item.payment_method.clone())
        ));
        if let Some(code) = &item.payment_code {
            message.push_str(&format!("  Linha digitável:\n  `{}`\n", code));
        } else if let Some(invoice) = &item.invoice_number {
            message.push_str(&format!("  Nº: {}\n", invoice));
        }
        message.push('\n');
    }

    message.push_str(&format!("*Total: {}*", format_currency(total, format)));
    Some(message)
}
