//! Fixed user-facing message templates. Users only ever see one of
//! these strings; raw errors never reach the chat.

use crate::services::progression::DayBucket;

pub fn welcome_new(display_name: &str, tenant_name: &str) -> String {
    format!(
        "{display_name}さん、{tenant_name}の足健康プログラムへようこそ！\n足の健康チェックを始めましょう。"
    )
}

pub fn welcome_back(display_name: &str, tenant_name: &str) -> String {
    format!(
        "{display_name}さん、またお会いできて嬉しいです！\n{tenant_name}の足健康プログラムを再開しましょう。"
    )
}

pub fn grade_ack(display_name: &str) -> String {
    format!(
        "{display_name}さん、足健診結果の入力ありがとうございます！1週間後に新しい運動メニューを配信しますので、今日教わった内容を継続しましょう！"
    )
}

pub fn need_grade_first(display_name: &str) -> String {
    format!(
        "{display_name}さん、先に足の健康チェック結果を教えてください。A、B、C、Dのいずれかで回答してください。"
    )
}

/// Tone varies by bucket: sympathetic for zero, encouraging for low,
/// congratulatory for high.
pub fn day_count_ack(display_name: &str, bucket: DayBucket) -> String {
    match bucket {
        DayBucket::Zero => format!(
            "{display_name}さん、大丈夫です。次週は1回だけで構いません。一緒に頑張りましょう。"
        ),
        DayBucket::Low => {
            format!("{display_name}さん、その調子です。今週も一緒に頑張りましょう。")
        }
        DayBucket::High => {
            format!("{display_name}さん、素晴らしいですね！その調子で継続しましょう。")
        }
    }
}

pub fn fallback(display_name: &str, tenant_name: &str) -> String {
    format!(
        "{display_name}さん、申し訳ありませんが、{tenant_name}の足健康プログラムは足健診結果に基づいた運動プログラムの提供と、運動の継続状況の確認のみに対応しています。\n\n\
         個別のご質問やご相談には対応できませんので、ご了承ください。\n\n\
         足健診結果はA〜D（大文字小文字、全角半角どちらでも可）、または運動日数は1〜7の数字で入力してください。\n\n\
         運動プログラムの継続状況については、1週間ごとにご連絡いたします。"
    )
}

pub fn weekly_reminder(display_name: &str, tenant_name: &str) -> String {
    format!(
        "{display_name}さん、{tenant_name}の足健康プログラムからお知らせです。この1週間で運動は何回できましたか？0〜7回でご回答ください。"
    )
}
