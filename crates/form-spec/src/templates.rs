//! Built-in form templates offered when creating a new form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::field_type::FieldType;
use crate::spec::field::{Field, FieldCondition};
use crate::spec::form::{FormId, FormStatus, NewForm};

/// A field of a template. `shown_when` refers to another template field by index.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateField {
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub required: bool,
    pub placeholder: Option<&'static str>,
    pub options: &'static [&'static str],
    pub shown_when: Option<(usize, &'static str)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<TemplateField>,
}

impl FormTemplate {
    /// Form input for this template. The form starts as a draft with a generated slug.
    pub fn new_form(&self) -> NewForm {
        NewForm {
            name: self.name.to_string(),
            description: Some(self.description.to_string()),
            status: FormStatus::Draft,
            ..NewForm::default()
        }
    }

    /// Materialises the template's fields for `form_id` with fresh ids and
    /// consecutive `order` values starting at 1.
    pub fn build_fields(&self, form_id: FormId, now: DateTime<Utc>) -> Vec<Field> {
        let ids = self
            .fields
            .iter()
            .map(|_| Uuid::new_v4())
            .collect::<Vec<_>>();

        self.fields
            .iter()
            .zip(&ids)
            .enumerate()
            .map(|(index, (field, id))| Field {
                id: *id,
                form_id,
                label: field.label.to_string(),
                kind: field.kind,
                required: field.required,
                placeholder: field.placeholder.map(str::to_string),
                options: (!field.options.is_empty())
                    .then(|| field.options.iter().map(|option| option.to_string()).collect()),
                order: index as i64 + 1,
                enabled: true,
                condition: field.shown_when.and_then(|(controller, value)| {
                    ids.get(controller).map(|depends_on| FieldCondition {
                        depends_on_field_id: *depends_on,
                        show_when_value: value.to_string(),
                    })
                }),
                created_at: now,
                updated_at: now,
            })
            .collect()
    }
}

const fn field(label: &'static str, kind: FieldType, required: bool) -> TemplateField {
    TemplateField {
        label,
        kind,
        required,
        placeholder: None,
        options: &[],
        shown_when: None,
    }
}

const fn typed(
    label: &'static str,
    kind: FieldType,
    placeholder: &'static str,
) -> TemplateField {
    TemplateField {
        label,
        kind,
        required: true,
        placeholder: Some(placeholder),
        options: &[],
        shown_when: None,
    }
}

const fn choice(
    label: &'static str,
    kind: FieldType,
    options: &'static [&'static str],
) -> TemplateField {
    TemplateField {
        label,
        kind,
        required: true,
        placeholder: None,
        options,
        shown_when: None,
    }
}

pub fn contact() -> FormTemplate {
    FormTemplate {
        key: "contact",
        name: "نموذج تواصل",
        description: "نموذج بسيط لجمع معلومات التواصل من العملاء",
        fields: vec![
            typed("الاسم الكامل", FieldType::Text, "أدخل اسمك الكامل"),
            typed("البريد الإلكتروني", FieldType::Email, "example@email.com"),
            typed("رقم الهاتف", FieldType::Phone, "+216 XX XXX XXX"),
            choice(
                "الموضوع",
                FieldType::Select,
                &["استفسار", "شكوى", "اقتراح", "طلب خدمة"],
            ),
            typed("الرسالة", FieldType::Textarea, "اكتب رسالتك هنا"),
        ],
    }
}

pub fn job_application() -> FormTemplate {
    FormTemplate {
        key: "job_application",
        name: "نموذج طلب توظيف",
        description: "نموذج شامل لطلبات التوظيف",
        fields: vec![
            typed("الاسم الكامل", FieldType::Text, "أدخل اسمك الكامل"),
            typed("البريد الإلكتروني", FieldType::Email, "example@email.com"),
            typed("رقم الهاتف", FieldType::Phone, "+216 XX XXX XXX"),
            typed("العنوان", FieldType::Text, "العنوان الكامل"),
            choice(
                "المؤهل العلمي",
                FieldType::Select,
                &["ثانوي", "بكالوريوس", "ماستر", "دكتوراه"],
            ),
            typed("سنوات الخبرة", FieldType::Number, "عدد سنوات الخبرة"),
            typed("الوظيفة المطلوبة", FieldType::Text, "اسم الوظيفة"),
            typed("المهارات", FieldType::Textarea, "اذكر مهاراتك الرئيسية"),
            TemplateField {
                placeholder: Some("أي معلومات إضافية"),
                ..field("ملاحظات إضافية", FieldType::Textarea, false)
            },
        ],
    }
}

/// Index of the current-housing question; the rent amount depends on it.
const HOUSING_KIND: usize = 8;

pub fn housing() -> FormTemplate {
    FormTemplate {
        key: "housing",
        name: "نموذج طلب امتلاك مسكن",
        description: "نموذج شامل لجمع معلومات المستأجرين الراغبين في امتلاك مسكن",
        fields: vec![
            typed("الاسم الكامل", FieldType::Text, "أدخل اسمك الكامل"),
            typed("رقم الهاتف", FieldType::Phone, "+216 XX XXX XXX"),
            typed("البريد الإلكتروني", FieldType::Email, "example@email.com"),
            choice(
                "الفئة العمرية",
                FieldType::Select,
                &["أقل من 25", "25-35", "36-45", "46-55", "أكثر من 55"],
            ),
            choice(
                "الحالة العائلية",
                FieldType::Select,
                &["أعزب", "متزوج", "مطلق", "أرمل"],
            ),
            typed("عدد أفراد الأسرة", FieldType::Number, "عدد أفراد الأسرة"),
            choice(
                "المهنة / القطاع",
                FieldType::Select,
                &["موظف حكومي", "موظف خاص", "صاحب عمل", "طالب", "متقاعد", "غير ذلك"],
            ),
            typed(
                "موقع السكن الحالي",
                FieldType::Location,
                "اضغط على الخريطة لتحديد موقع سكنك الحالي",
            ),
            choice(
                "نوع السكن الحالي",
                FieldType::Select,
                &["كراء", "سكن عائلي", "سكن وظيفي"],
            ),
            TemplateField {
                shown_when: Some((HOUSING_KIND, "كراء")),
                ..typed("قيمة الكراء الشهري", FieldType::Number, "بالدينار التونسي")
            },
            typed(
                "الموقع المرغوب لاقتناء المسكن",
                FieldType::Location,
                "اضغط على الخريطة لتحديد الموقع المرغوب",
            ),
            choice(
                "نوع المسكن المطلوب",
                FieldType::Checkbox,
                &["شقة", "منزل", "فيلا", "قطعة أرض"],
            ),
            typed("الميزانية القصوى المتوقعة", FieldType::Number, "بالدينار التونسي"),
            choice(
                "طريقة التمويل",
                FieldType::Checkbox,
                &["تمويل بنكي", "دفع ذاتي", "الاثنين"],
            ),
            typed("الدخل الشهري التقريبي", FieldType::Number, "بالدينار التونسي"),
            choice("هل يوجد قرض حالي؟", FieldType::Select, &["نعم", "لا"]),
            choice(
                "متى تنوي اقتناء المسكن؟",
                FieldType::Select,
                &["فوراً", "خلال 6 أشهر", "خلال سنة", "أكثر من سنة"],
            ),
            choice("هل ترغب في التواصل مع مستشار؟", FieldType::Select, &["نعم", "لا"]),
            TemplateField {
                placeholder: Some("أي ملاحظات أخرى"),
                ..field("ملاحظات إضافية", FieldType::Textarea, false)
            },
        ],
    }
}

pub fn builtin_templates() -> Vec<FormTemplate> {
    vec![contact(), job_application(), housing()]
}

pub fn find_template(key: &str) -> Option<FormTemplate> {
    builtin_templates()
        .into_iter()
        .find(|template| template.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::definition::check_conditions;

    #[test]
    fn templates_are_well_formed() {
        let now = Utc::now();
        for template in builtin_templates() {
            let fields = template.build_fields(Uuid::new_v4(), now);
            for field in &fields {
                assert_eq!(
                    field.kind.requires_options(),
                    field.options.as_ref().is_some_and(|options| !options.is_empty()),
                    "{} / {}",
                    template.key,
                    field.label
                );
            }
            check_conditions(&fields).expect("conditions resolve");
        }
    }

    #[test]
    fn housing_rent_depends_on_current_housing_kind() {
        let fields = housing().build_fields(Uuid::new_v4(), Utc::now());
        let rent = &fields[HOUSING_KIND + 1];
        let condition = rent.condition.as_ref().expect("conditional");
        assert_eq!(condition.depends_on_field_id, fields[HOUSING_KIND].id);
        assert_eq!(condition.show_when_value, "كراء");
        assert!(fields[HOUSING_KIND].choices().contains(&"كراء".to_string()));
    }
}
