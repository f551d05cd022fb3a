//! Ready-made component sources for tests.

/// A counter with a `<script setup>` and scoped styles.
pub const SAMPLE_COUNTER: &str = r#"<template>
  <button class="counter" @click="count++">{{ label }}: {{ count }}</button>
</template>

<script setup>
import { ref } from 'vue'
const props = defineProps(['label'])
const count = ref(0)
</script>

<style scoped>
.counter { font-weight: bold; }
</style>
"#;

/// A component without a script.
pub const NOTICE: &str = r#"<template>
  <p class="notice">{{ text }}</p>
</template>
"#;

/// A page using both components and store data.
pub const INDEX_PAGE: &str = r#"<template>
  <main>
    <h1>{{ heading }}</h1>
    <SampleCounter label="Clicks"/>
    <sample-counter></sample-counter>
    <Notice :text="notice"/>
    <ul>
      <li v-for="item in items">{{ item }}</li>
    </ul>
  </main>
</template>

<script>
export default {
  data() {
    return { heading: "Welcome" }
  }
}
</script>

<style>
main { margin: 0 auto; }
</style>
"#;

/// A page whose template does not compile: it calls a function.
pub const BROKEN_PAGE: &str = r#"<template>
  <p>{{ format(value) }}</p>
</template>
"#;

/// `(id, source)` pairs of a small site.
pub const SAMPLE_SITE: &[(&str, &str)] = &[
    ("pages/index", INDEX_PAGE),
    ("pages/broken", BROKEN_PAGE),
    ("components/sample-counter", SAMPLE_COUNTER),
    ("components/notice", NOTICE),
];
